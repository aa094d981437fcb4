use std::path::Path;

use bitflags::bitflags;
use tracing::debug;

use crate::{
    error::{Error, Result},
    id::{self, QgroupId},
    limit::{parse_limit, SizeLimit},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Assign,
    Remove,
}

impl Relation {
    pub fn verb(self) -> &'static str {
        match self {
            Relation::Assign => "assign",
            Relation::Remove => "remove",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssignRequest {
    pub src: QgroupId,
    pub dst: QgroupId,
    pub relation: Relation,
}

/// `src` may only be attached below a group of strictly higher level.
pub fn validate_relation(src: QgroupId, dst: QgroupId, path: &Path) -> Result<()> {
    if src.level() < dst.level() {
        Ok(())
    } else {
        Err(Error::InvalidHierarchy {
            path: path.to_path_buf(),
            src,
            dst,
        })
    }
}

impl AssignRequest {
    pub fn build(relation: Relation, src: &str, dst: &str, path: &Path) -> Result<Self> {
        let src = id::parse(src)?;
        let dst = id::parse(dst)?;
        validate_relation(src, dst, path)?;

        let req = AssignRequest { src, dst, relation };
        debug!(?req, "built relation request");
        Ok(req)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateRequest {
    pub qgroupid: QgroupId,
    pub create: bool,
}

impl CreateRequest {
    pub fn build(create: bool, qgroupid: &str) -> Result<Self> {
        let req = CreateRequest {
            qgroupid: id::parse(qgroupid)?,
            create,
        };
        debug!(?req, "built create request");
        Ok(req)
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct LimitFlags: u64 {
        // BTRFS_QGROUP_LIMIT_<FLAG>
        const MAX_RFER = 1 << 0;
        const MAX_EXCL = 1 << 1;
        const RSV_RFER = 1 << 2;
        const RSV_EXCL = 1 << 3;
        const RFER_CMPR = 1 << 4;
        const EXCL_CMPR = 1 << 5;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    MaxReferenced,
    MaxExclusive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitTarget {
    /// The subvolume the opened path is the root of.
    CurrentSubvolume,
    Qgroup(QgroupId),
}

impl LimitTarget {
    pub fn to_raw(self) -> u64 {
        match self {
            // zero tells the kernel to use the subvolume of the fd
            LimitTarget::CurrentSubvolume => 0,
            LimitTarget::Qgroup(id) => id.encode(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitRequest {
    pub target: LimitTarget,
    pub size: SizeLimit,
    pub kind: LimitKind,
    pub compressed: bool,
}

impl LimitRequest {
    /// Parses everything but the target; resolving an implicit target needs the filesystem.
    pub fn parse_size(size: &str, compressed: bool) -> Result<SizeLimit> {
        if !compressed {
            return Err(Error::CompressionRequired);
        }
        parse_limit(size)
    }

    pub fn new(target: LimitTarget, size: SizeLimit, kind: LimitKind) -> Self {
        let req = LimitRequest {
            target,
            size,
            kind,
            compressed: true,
        };
        debug!(?req, "built limit request");
        req
    }

    pub fn flags(&self) -> LimitFlags {
        let mut flags = match self.kind {
            LimitKind::MaxReferenced => LimitFlags::MAX_RFER,
            LimitKind::MaxExclusive => LimitFlags::MAX_EXCL,
        };
        if self.compressed {
            flags |= LimitFlags::RFER_CMPR | LimitFlags::EXCL_CMPR;
        }
        flags
    }

    pub fn max_referenced(&self) -> u64 {
        match self.kind {
            LimitKind::MaxReferenced => self.size.to_raw(),
            LimitKind::MaxExclusive => 0,
        }
    }

    pub fn max_exclusive(&self) -> u64 {
        match self.kind {
            LimitKind::MaxExclusive => self.size.to_raw(),
            LimitKind::MaxReferenced => 0,
        }
    }
}

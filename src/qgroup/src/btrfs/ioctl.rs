use std::mem::size_of;

use libc::c_char;

use crate::request::{AssignRequest, CreateRequest, LimitRequest, Relation};

const BTRFS_IOCTL_MAGIC: u8 = 0x94;

pub const BTRFS_FIRST_FREE_OBJECTID: u64 = 256;
pub const BTRFS_QUOTA_TREE_OBJECTID: u64 = 8;

pub const BTRFS_QGROUP_INFO_KEY: u32 = 242;
pub const BTRFS_QGROUP_LIMIT_KEY: u32 = 244;
pub const BTRFS_QGROUP_RELATION_KEY: u32 = 246;

const BTRFS_INO_LOOKUP_PATH_MAX: usize = 4080;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsIoctlQgroupAssignArgs {
    pub assign: u64,
    pub src: u64,
    pub dst: u64,
}

impl From<&AssignRequest> for BtrfsIoctlQgroupAssignArgs {
    fn from(req: &AssignRequest) -> Self {
        Self {
            assign: (req.relation == Relation::Assign) as u64,
            src: req.src.encode(),
            dst: req.dst.encode(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsIoctlQgroupCreateArgs {
    pub create: u64,
    pub qgroupid: u64,
}

impl From<&CreateRequest> for BtrfsIoctlQgroupCreateArgs {
    fn from(req: &CreateRequest) -> Self {
        Self {
            create: req.create as u64,
            qgroupid: req.qgroupid.encode(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsQgroupLimit {
    pub flags: u64,
    pub max_rfer: u64,
    pub max_excl: u64,
    pub rsv_rfer: u64,
    pub rsv_excl: u64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsIoctlQgroupLimitArgs {
    pub qgroupid: u64,
    pub lim: BtrfsQgroupLimit,
}

impl From<&LimitRequest> for BtrfsIoctlQgroupLimitArgs {
    fn from(req: &LimitRequest) -> Self {
        Self {
            qgroupid: req.target.to_raw(),
            lim: BtrfsQgroupLimit {
                flags: req.flags().bits(),
                max_rfer: req.max_referenced(),
                max_excl: req.max_exclusive(),
                rsv_rfer: 0,
                rsv_excl: 0,
            },
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsIoctlQuotaRescanArgs {
    pub flags: u64,
    pub progress: u64,
    pub reserved: [u64; 6],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct BtrfsIoctlInoLookupArgs {
    pub treeid: u64,
    pub objectid: u64,
    pub name: [c_char; BTRFS_INO_LOOKUP_PATH_MAX],
}

impl BtrfsIoctlInoLookupArgs {
    pub fn new(treeid: u64, objectid: u64) -> Self {
        Self {
            treeid,
            objectid,
            name: [0; BTRFS_INO_LOOKUP_PATH_MAX],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct BtrfsIoctlSearchKey {
    pub tree_id: u64,
    pub min_objectid: u64,
    pub max_objectid: u64,
    pub min_offset: u64,
    pub max_offset: u64,
    pub min_transid: u64,
    pub max_transid: u64,
    pub min_type: u32,
    pub max_type: u32,
    pub nr_items: u32,
    pub unused: u32,
    pub unused1: u64,
    pub unused2: u64,
    pub unused3: u64,
    pub unused4: u64,
}

pub const SEARCH_BUF_SIZE: usize = 4096 - size_of::<BtrfsIoctlSearchKey>();

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct BtrfsIoctlSearchArgs {
    pub key: BtrfsIoctlSearchKey,
    pub buf: [u8; SEARCH_BUF_SIZE],
}

impl BtrfsIoctlSearchArgs {
    pub fn new(key: BtrfsIoctlSearchKey) -> Self {
        Self {
            key,
            buf: [0; SEARCH_BUF_SIZE],
        }
    }
}

/// Precedes every item in a tree search result buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct BtrfsIoctlSearchHeader {
    pub transid: u64,
    pub objectid: u64,
    pub offset: u64,
    pub type_: u32,
    pub len: u32,
}

pub const SEARCH_HEADER_SIZE: usize = size_of::<BtrfsIoctlSearchHeader>();

nix::ioctl_readwrite!(tree_search, BTRFS_IOCTL_MAGIC, 17, BtrfsIoctlSearchArgs);
nix::ioctl_readwrite!(ino_lookup, BTRFS_IOCTL_MAGIC, 18, BtrfsIoctlInoLookupArgs);
nix::ioctl_write_ptr!(qgroup_assign, BTRFS_IOCTL_MAGIC, 41, BtrfsIoctlQgroupAssignArgs);
nix::ioctl_write_ptr!(qgroup_create, BTRFS_IOCTL_MAGIC, 42, BtrfsIoctlQgroupCreateArgs);
nix::ioctl_read!(qgroup_limit, BTRFS_IOCTL_MAGIC, 43, BtrfsIoctlQgroupLimitArgs);
nix::ioctl_write_ptr!(quota_rescan, BTRFS_IOCTL_MAGIC, 44, BtrfsIoctlQuotaRescanArgs);

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        id::QgroupId,
        limit::SizeLimit,
        request::{LimitKind, LimitTarget},
    };

    #[test]
    fn struct_sizes_match_uapi() {
        assert_eq!(size_of::<BtrfsIoctlQgroupAssignArgs>(), 24);
        assert_eq!(size_of::<BtrfsIoctlQgroupCreateArgs>(), 16);
        assert_eq!(size_of::<BtrfsIoctlQgroupLimitArgs>(), 48);
        assert_eq!(size_of::<BtrfsIoctlQuotaRescanArgs>(), 64);
        assert_eq!(size_of::<BtrfsIoctlInoLookupArgs>(), 4096);
        assert_eq!(size_of::<BtrfsIoctlSearchKey>(), 104);
        assert_eq!(size_of::<BtrfsIoctlSearchArgs>(), 4096);
        assert_eq!(SEARCH_HEADER_SIZE, 32);
    }

    #[test]
    fn limit_args_from_request() {
        let req = LimitRequest::new(
            LimitTarget::Qgroup(QgroupId::new(0, 261).unwrap()),
            SizeLimit::Bytes(500 << 20),
            LimitKind::MaxExclusive,
        );
        let args = BtrfsIoctlQgroupLimitArgs::from(&req);
        assert_eq!(args.qgroupid, 261);
        // MAX_EXCL | RFER_CMPR | EXCL_CMPR
        assert_eq!(args.lim.flags, 2 | 16 | 32);
        assert_eq!(args.lim.max_excl, 500 << 20);
        assert_eq!(args.lim.max_rfer, 0);
    }

    #[test]
    fn assign_args_from_request() {
        let req = AssignRequest {
            src: QgroupId::new(0, 259).unwrap(),
            dst: QgroupId::new(1, 5).unwrap(),
            relation: Relation::Remove,
        };
        let args = BtrfsIoctlQgroupAssignArgs::from(&req);
        assert_eq!(args.assign, 0);
        assert_eq!(args.src, 259);
        assert_eq!(args.dst, (1 << 48) | 5);
    }
}

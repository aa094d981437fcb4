use std::{
    fs::{self, File},
    os::{
        fd::{AsRawFd, RawFd},
        unix::fs::MetadataExt,
    },
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    sys::statfs::{statfs, BTRFS_SUPER_MAGIC},
};
use tracing::{debug, trace};

use crate::{
    engine::{AssignStatus, ListingEngine, Mount, QuotaEngine},
    error::{Error, Result},
    listing::{ListingSpec, QgroupRow},
    request::{AssignRequest, CreateRequest, LimitRequest},
};

mod ioctl;
mod tree;

use ioctl::{
    BtrfsIoctlInoLookupArgs, BtrfsIoctlQgroupAssignArgs, BtrfsIoctlQgroupCreateArgs,
    BtrfsIoctlQgroupLimitArgs, BtrfsIoctlQuotaRescanArgs, BTRFS_FIRST_FREE_OBJECTID,
};

/// An open directory on a btrfs filesystem. Closed on drop.
#[derive(Debug)]
pub struct BtrfsDir {
    file: File,
    path: PathBuf,
}

impl BtrfsDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRawFd for BtrfsDir {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn is_btrfs(path: &Path) -> Result<bool> {
    let st = statfs(path).map_err(|e| Error::access(path, e))?;
    Ok(st.filesystem_type() == BTRFS_SUPER_MAGIC)
}

/// The real kernel interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct Btrfs;

impl Mount for Btrfs {
    type Handle = BtrfsDir;

    fn open_dir(&self, path: &Path) -> Result<BtrfsDir> {
        if !is_btrfs(path)? {
            return Err(Error::NotBtrfs(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| Error::access(path, e))?;
        let meta = file.metadata().map_err(|e| Error::access(path, e))?;
        if !meta.is_dir() {
            return Err(Error::access(path, Errno::ENOTDIR));
        }

        debug!(path = %path.display(), fd = file.as_raw_fd(), "opened directory");
        Ok(BtrfsDir {
            file,
            path: path.to_path_buf(),
        })
    }

    fn is_subvolume(&self, path: &Path) -> Result<bool> {
        let meta = fs::metadata(path).map_err(|e| Error::access(path, e))?;
        // subvolume roots always have the first free inode number
        if meta.ino() != BTRFS_FIRST_FREE_OBJECTID || !meta.is_dir() {
            return Ok(false);
        }
        is_btrfs(path)
    }

    fn root_id(&self, handle: &BtrfsDir) -> Result<u64> {
        let mut args = Box::new(BtrfsIoctlInoLookupArgs::new(0, BTRFS_FIRST_FREE_OBJECTID));
        unsafe { ioctl::ino_lookup(handle.as_raw_fd(), &mut *args) }
            .map_err(Error::engine("look up subvolume id"))?;
        trace!(treeid = args.treeid, "resolved root id");
        Ok(args.treeid)
    }
}

impl QuotaEngine for Btrfs {
    fn assign(&self, handle: &BtrfsDir, req: &AssignRequest) -> nix::Result<AssignStatus> {
        let args = BtrfsIoctlQgroupAssignArgs::from(req);
        let ret = unsafe { ioctl::qgroup_assign(handle.as_raw_fd(), &args) }?;
        trace!(?args, ret, "qgroup_assign");

        // positive return: the relation change invalidated accounting. older kernels never report it
        Ok(if ret > 0 {
            AssignStatus::Inconsistent
        } else {
            AssignStatus::Consistent
        })
    }

    fn create(&self, handle: &BtrfsDir, req: &CreateRequest) -> nix::Result<()> {
        let args = BtrfsIoctlQgroupCreateArgs::from(req);
        unsafe { ioctl::qgroup_create(handle.as_raw_fd(), &args) }?;
        trace!(?args, "qgroup_create");
        Ok(())
    }

    fn limit(&self, handle: &BtrfsDir, req: &LimitRequest) -> nix::Result<()> {
        let mut args = BtrfsIoctlQgroupLimitArgs::from(req);
        unsafe { ioctl::qgroup_limit(handle.as_raw_fd(), &mut args) }?;
        trace!(?args, "qgroup_limit");
        Ok(())
    }

    fn rescan(&self, handle: &BtrfsDir) -> nix::Result<()> {
        let args = BtrfsIoctlQuotaRescanArgs::default();
        unsafe { ioctl::quota_rescan(handle.as_raw_fd(), &args) }?;
        trace!("quota_rescan");
        Ok(())
    }
}

impl ListingEngine for Btrfs {
    fn list(&self, handle: &BtrfsDir, spec: &ListingSpec) -> nix::Result<Vec<QgroupRow>> {
        let fd = handle.as_raw_fd();
        let rows = tree::load_qgroups(|args| unsafe { ioctl::tree_search(fd, args) }.map(drop))?;
        Ok(spec.select(rows))
    }
}

//! Boundary between request construction and the filesystem.
//!
//! Every call returns its own status; nothing reads a shared errno after the fact.

use std::path::Path;

use crate::{
    error::Result,
    listing::{ListingSpec, QgroupRow},
    request::{AssignRequest, CreateRequest, LimitRequest},
};

/// Whether a relation change left the accounting data out of date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignStatus {
    Consistent,
    Inconsistent,
}

/// Path-to-handle resolution. Handles release their resources on drop.
pub trait Mount {
    type Handle;

    fn open_dir(&self, path: &Path) -> Result<Self::Handle>;

    fn is_subvolume(&self, path: &Path) -> Result<bool>;

    /// Id of the subvolume the handle belongs to.
    fn root_id(&self, handle: &Self::Handle) -> Result<u64>;
}

pub trait QuotaEngine: Mount {
    fn assign(&self, handle: &Self::Handle, req: &AssignRequest) -> nix::Result<AssignStatus>;

    fn create(&self, handle: &Self::Handle, req: &CreateRequest) -> nix::Result<()>;

    fn limit(&self, handle: &Self::Handle, req: &LimitRequest) -> nix::Result<()>;

    fn rescan(&self, handle: &Self::Handle) -> nix::Result<()>;
}

pub trait ListingEngine: Mount {
    /// Groups matching `spec`, in the order it asks for.
    fn list(&self, handle: &Self::Handle, spec: &ListingSpec) -> nix::Result<Vec<QgroupRow>>;
}

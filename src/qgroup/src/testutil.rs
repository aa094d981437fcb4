use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
    rc::Rc,
};

use nix::errno::Errno;

use crate::{
    engine::{AssignStatus, ListingEngine, Mount, QuotaEngine},
    error::{Error, Result},
    listing::{ListingSpec, QgroupRow},
    request::{AssignRequest, CreateRequest, LimitRequest},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub open: usize,
    pub is_subvolume: usize,
    pub root_id: usize,
    pub assign: Vec<AssignRequest>,
    pub create: Vec<CreateRequest>,
    pub limit: Vec<LimitRequest>,
    pub rescan: usize,
    pub list: Vec<ListingSpec>,
}

impl Calls {
    pub fn engine_calls(&self) -> usize {
        self.assign.len() + self.create.len() + self.limit.len() + self.rescan + self.list.len()
    }
}

pub struct FakeHandle {
    live: Rc<Cell<usize>>,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

/// Records every call and answers from scripted results.
pub struct FakeEngine {
    pub open_error: Option<Errno>,
    pub subvolume: bool,
    pub root_id: u64,
    pub assign_result: nix::Result<AssignStatus>,
    pub create_result: nix::Result<()>,
    pub limit_result: nix::Result<()>,
    pub rescan_result: nix::Result<()>,
    pub rows: Vec<QgroupRow>,
    pub list_error: Option<Errno>,
    pub(crate) calls: RefCell<Calls>,
    pub(crate) live: Rc<Cell<usize>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            open_error: None,
            subvolume: true,
            root_id: 5,
            assign_result: Ok(AssignStatus::Consistent),
            create_result: Ok(()),
            limit_result: Ok(()),
            rescan_result: Ok(()),
            rows: Vec::new(),
            list_error: None,
            calls: RefCell::default(),
            live: Rc::default(),
        }
    }
}

impl FakeEngine {
    pub fn calls(&self) -> Calls {
        self.calls.borrow().clone()
    }

    /// Handles currently open.
    pub fn live_handles(&self) -> usize {
        self.live.get()
    }

    pub fn handle(&self) -> FakeHandle {
        self.live.set(self.live.get() + 1);
        FakeHandle {
            live: self.live.clone(),
        }
    }
}

impl Mount for FakeEngine {
    type Handle = FakeHandle;

    fn open_dir(&self, path: &Path) -> Result<FakeHandle> {
        self.calls.borrow_mut().open += 1;
        if let Some(errno) = self.open_error {
            return Err(Error::access(PathBuf::from(path), errno));
        }
        Ok(self.handle())
    }

    fn is_subvolume(&self, _path: &Path) -> Result<bool> {
        self.calls.borrow_mut().is_subvolume += 1;
        Ok(self.subvolume)
    }

    fn root_id(&self, _handle: &FakeHandle) -> Result<u64> {
        self.calls.borrow_mut().root_id += 1;
        Ok(self.root_id)
    }
}

impl QuotaEngine for FakeEngine {
    fn assign(&self, _handle: &FakeHandle, req: &AssignRequest) -> nix::Result<AssignStatus> {
        self.calls.borrow_mut().assign.push(*req);
        self.assign_result
    }

    fn create(&self, _handle: &FakeHandle, req: &CreateRequest) -> nix::Result<()> {
        self.calls.borrow_mut().create.push(*req);
        self.create_result
    }

    fn limit(&self, _handle: &FakeHandle, req: &LimitRequest) -> nix::Result<()> {
        self.calls.borrow_mut().limit.push(*req);
        self.limit_result
    }

    fn rescan(&self, _handle: &FakeHandle) -> nix::Result<()> {
        self.calls.borrow_mut().rescan += 1;
        self.rescan_result
    }
}

impl ListingEngine for FakeEngine {
    fn list(&self, _handle: &FakeHandle, spec: &ListingSpec) -> nix::Result<Vec<QgroupRow>> {
        self.calls.borrow_mut().list.push(spec.clone());
        match self.list_error {
            Some(errno) => Err(errno),
            None => Ok(spec.select(self.rows.clone())),
        }
    }
}

use tracing::{debug, warn};

use crate::{
    config::NoRescanMode,
    engine::{AssignStatus, QuotaEngine},
    error::Error,
};

/// The `--rescan` / `--no-rescan` switches as given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RescanFlags {
    pub rescan: bool,
    pub no_rescan: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RescanPreference {
    Requested,
    NotRequested,
}

impl RescanFlags {
    pub fn resolve(self, mode: NoRescanMode) -> RescanPreference {
        match (mode, self.rescan, self.no_rescan) {
            (NoRescanMode::Defer, _, true) => RescanPreference::NotRequested,
            (_, true, _) => RescanPreference::Requested,
            _ => RescanPreference::NotRequested,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsistencyOutcome {
    Consistent,
    InconsistentRescanRequested,
    InconsistentRescanDeferred,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowUp {
    Nothing,
    SubmitRescan,
    WarnRescanNeeded,
}

/// Follow-up action and terminal state for an assign/remove result.
pub const fn decide(status: AssignStatus, pref: RescanPreference) -> (FollowUp, ConsistencyOutcome) {
    use RescanPreference::*;

    match (status, pref) {
        (AssignStatus::Consistent, _) => (FollowUp::Nothing, ConsistencyOutcome::Consistent),
        (AssignStatus::Inconsistent, Requested) => {
            (FollowUp::SubmitRescan, ConsistencyOutcome::InconsistentRescanRequested)
        }
        (AssignStatus::Inconsistent, NotRequested) => {
            (FollowUp::WarnRescanNeeded, ConsistencyOutcome::InconsistentRescanDeferred)
        }
    }
}

#[derive(Debug)]
pub struct Settlement {
    pub outcome: ConsistencyOutcome,
    /// Set when a rescan was wanted but could not be submitted.
    pub rescan_error: Option<Error>,
}

impl Settlement {
    pub fn is_clean(&self) -> bool {
        self.rescan_error.is_none()
    }
}

pub fn settle<E: QuotaEngine>(
    engine: &E,
    handle: &E::Handle,
    status: AssignStatus,
    pref: RescanPreference,
) -> Settlement {
    let (follow_up, outcome) = decide(status, pref);
    debug!(?status, ?pref, ?follow_up, ?outcome, "settling relation change");

    let rescan_error = match follow_up {
        FollowUp::Nothing => None,
        FollowUp::SubmitRescan => match engine.rescan(handle) {
            Ok(()) => None,
            Err(errno) => {
                warn!("quota rescan failed: {}", errno);
                Some(Error::Engine { op: "start quota rescan", errno })
            }
        },
        FollowUp::WarnRescanNeeded => {
            warn!("quotas may be inconsistent, rescan needed");
            None
        }
    };

    Settlement {
        outcome,
        rescan_error,
    }
}

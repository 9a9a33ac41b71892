//! Job lifecycle.

use std::fmt;
use thiserror::Error;

/// Where a job is in its pipeline.
///
/// `Failed` is reachable only from `Fetching` and `ConfiguringBuilds`; a failed build moves
/// on to the next one rather than failing the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Fetching,
    ConfiguringBuilds,
    /// Running build `index` (1-based) of `total`.
    Building { index: usize, total: usize },
    Notifying,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal job state transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: JobState,
    pub to: JobState,
}

impl JobState {
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        use JobState::*;
        match (*self, *next) {
            (Queued, Fetching) => true,
            (Fetching, ConfiguringBuilds | Failed) => true,
            (ConfiguringBuilds, Failed) => true,
            (ConfiguringBuilds, Building { index: 1, total }) => total >= 1,
            (Building { index, total }, Building { index: after, total: same }) => {
                total == same && after == index + 1 && after <= total
            }
            (Building { index, total }, Notifying) => index == total,
            (Notifying, Done) => true,
            _ => false,
        }
    }

    /// Move to `next`, or refuse if the lifecycle does not allow it.
    pub fn transition(self, next: JobState) -> Result<JobState, IllegalTransition> {
        if self.can_transition_to(&next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Fetching => write!(f, "fetching"),
            JobState::ConfiguringBuilds => write!(f, "configuring builds"),
            JobState::Building { index, total } => write!(f, "building {index}/{total}"),
            JobState::Notifying => write!(f, "notifying"),
            JobState::Done => write!(f, "done"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

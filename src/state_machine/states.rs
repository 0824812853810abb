use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state of a single task, persisted as a small integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskExecState {
    /// Task created, not yet picked up by a processor
    None,
    /// Task assigned and executing
    InProgress,
    /// Task failed
    Error,
    /// Task completed successfully
    Ok,
    /// Task skipped by graph evaluation
    Skipped,
    /// Administrative override, reachable from any state
    NotUsedAnymore,
    /// A cache hit is being validated before execution
    CheckCache,
}

impl TaskExecState {
    pub const fn code(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::InProgress => 1,
            Self::Error => 2,
            Self::Ok => 3,
            Self::Skipped => 4,
            Self::NotUsedAnymore => 5,
            Self::CheckCache => 6,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, String> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Error),
            3 => Ok(Self::Ok),
            4 => Ok(Self::Skipped),
            5 => Ok(Self::NotUsedAnymore),
            6 => Ok(Self::CheckCache),
            _ => Err(format!("Invalid task exec state code: {code}")),
        }
    }

    /// Check if this is a terminal state (no further transitions allowed except the override)
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::Error | Self::Skipped | Self::NotUsedAnymore
        )
    }

    /// States a task can be stuck in after a dispatcher or processor crash
    pub fn is_lost_candidate(&self) -> bool {
        matches!(self, Self::None | Self::InProgress)
    }

    /// Legal transitions of the task lifecycle.
    ///
    /// NONE → IN_PROGRESS → {OK, ERROR, SKIPPED}, with CHECK_CACHE as a side branch
    /// entered before IN_PROGRESS. NOT_USED_ANYMORE is reachable from every state.
    pub fn can_transition_to(&self, next: TaskExecState) -> bool {
        if next == Self::NotUsedAnymore {
            return true;
        }
        match self {
            Self::None => matches!(next, Self::InProgress | Self::CheckCache | Self::Skipped),
            Self::CheckCache => matches!(next, Self::InProgress | Self::Ok | Self::None),
            Self::InProgress => matches!(next, Self::Ok | Self::Error | Self::Skipped),
            Self::Ok | Self::Error | Self::Skipped | Self::NotUsedAnymore => false,
        }
    }
}

impl Default for TaskExecState {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for TaskExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Error => write!(f, "ERROR"),
            Self::Ok => write!(f, "OK"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::NotUsedAnymore => write!(f, "NOT_USED_ANYMORE"),
            Self::CheckCache => write!(f, "CHECK_CACHE"),
        }
    }
}

impl std::str::FromStr for TaskExecState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "ERROR" => Ok(Self::Error),
            "OK" => Ok(Self::Ok),
            "SKIPPED" => Ok(Self::Skipped),
            "NOT_USED_ANYMORE" => Ok(Self::NotUsedAnymore),
            "CHECK_CACHE" => Ok(Self::CheckCache),
            _ => Err(format!("Invalid task exec state: {s}")),
        }
    }
}

/// Lifecycle state of an execution context (a running workflow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecContextState {
    /// Configuration error, the workflow can't run
    Error,
    /// Just created
    None,
    /// Tasks are being produced
    Producing,
    /// All tasks produced
    Produced,
    /// Running
    Started,
    /// Stopped by an operator
    Stopped,
    /// All tasks finished
    Finished,
    /// Reported by processors for contexts the dispatcher no longer knows
    DoesntExist,
}

impl ExecContextState {
    pub const fn code(&self) -> i32 {
        match self {
            Self::Error => -2,
            Self::None => 0,
            Self::Producing => 1,
            Self::Produced => 2,
            Self::Started => 3,
            Self::Stopped => 4,
            Self::Finished => 5,
            Self::DoesntExist => 6,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, String> {
        match code {
            -2 => Ok(Self::Error),
            0 => Ok(Self::None),
            1 => Ok(Self::Producing),
            2 => Ok(Self::Produced),
            3 => Ok(Self::Started),
            4 => Ok(Self::Stopped),
            5 => Ok(Self::Finished),
            6 => Ok(Self::DoesntExist),
            _ => Err(format!("Invalid exec context state code: {code}")),
        }
    }

    /// No task of a finished context will ever run again
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl Default for ExecContextState {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for ExecContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::None => write!(f, "NONE"),
            Self::Producing => write!(f, "PRODUCING"),
            Self::Produced => write!(f, "PRODUCED"),
            Self::Started => write!(f, "STARTED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::DoesntExist => write!(f, "DOESNT_EXIST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_codes_are_stable() {
        for state in [
            TaskExecState::None,
            TaskExecState::InProgress,
            TaskExecState::Error,
            TaskExecState::Ok,
            TaskExecState::Skipped,
            TaskExecState::NotUsedAnymore,
            TaskExecState::CheckCache,
        ] {
            assert_eq!(TaskExecState::from_code(state.code()), Ok(state));
            assert_eq!(state.to_string().parse::<TaskExecState>(), Ok(state));
        }
        assert!(TaskExecState::from_code(42).is_err());
    }

    #[test]
    fn test_task_transitions() {
        use TaskExecState::*;
        assert!(None.can_transition_to(InProgress));
        assert!(None.can_transition_to(CheckCache));
        assert!(CheckCache.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Ok));
        assert!(InProgress.can_transition_to(Error));
        assert!(InProgress.can_transition_to(Skipped));
        assert!(!Ok.can_transition_to(InProgress));
        assert!(!Error.can_transition_to(None));
        assert!(Ok.can_transition_to(NotUsedAnymore));
        assert!(None.can_transition_to(NotUsedAnymore));
    }

    #[test]
    fn test_lost_candidates() {
        assert!(TaskExecState::None.is_lost_candidate());
        assert!(TaskExecState::InProgress.is_lost_candidate());
        assert!(!TaskExecState::CheckCache.is_lost_candidate());
        assert!(!TaskExecState::Ok.is_lost_candidate());
    }

    #[test]
    fn test_exec_context_finished() {
        assert!(ExecContextState::Finished.is_finished());
        assert!(ExecContextState::Error.is_finished());
        assert!(!ExecContextState::Started.is_finished());
        assert!(!ExecContextState::Stopped.is_finished());
        assert_eq!(ExecContextState::from_code(-2), Ok(ExecContextState::Error));
    }
}

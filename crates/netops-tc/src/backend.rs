use crate::ops::TcOp;
use crate::TcError;

/// Classified result of applying one [`TcOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcOutcome {
    /// The kernel accepted the change. Carries any command output.
    Applied(String),
    /// A create collided with an object that already exists.
    Conflict(String),
    /// The target of the operation does not exist.
    Missing(String),
    /// Any other failure.
    Failed(String),
}

impl TcOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TcOutcome::Applied(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            TcOutcome::Applied(s)
            | TcOutcome::Conflict(s)
            | TcOutcome::Missing(s)
            | TcOutcome::Failed(s) => s,
        }
    }
}

/// Traffic shaping effector bound to one network interface.
///
/// Implementations never retry: conflict recovery is the caller's job and
/// depends only on the returned [`TcOutcome`].
pub trait ShapingBackend: Send + Sync {
    fn name(&self) -> &str;

    fn interface(&self) -> &str;

    fn available(&self) -> bool;

    fn apply(&self, op: &TcOp) -> TcOutcome;

    /// Human-readable dump of the qdiscs, classes and filters on the interface.
    fn show(&self) -> Result<String, TcError>;
}

pub fn select_backend(name: &str, interface: &str) -> Result<Box<dyn ShapingBackend>, TcError> {
    match name {
        "tc" => Ok(Box::new(crate::command::TcCommandBackend::new(interface))),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new(interface))),
        other => Err(TcError::BackendUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_backends() {
        assert_eq!(select_backend("tc", "eth0").unwrap().name(), "tc");
        let mock = select_backend("mock", "veth1").unwrap();
        assert_eq!(mock.name(), "mock");
        assert_eq!(mock.interface(), "veth1");
    }

    #[test]
    fn select_invalid_backend_fails() {
        assert!(select_backend("netlink", "eth0").is_err());
    }

    #[test]
    fn outcome_detail() {
        let outcome = TcOutcome::Conflict("RTNETLINK answers: File exists".to_owned());
        assert!(!outcome.is_applied());
        assert!(outcome.detail().contains("File exists"));
    }
}

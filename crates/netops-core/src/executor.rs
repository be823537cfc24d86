use netops_tc::{ShapingBackend, TcError, TcOp, TcOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Applies shaping operations through a backend, recovering from conflicts
/// with leftover kernel state.
///
/// A create that collides with an existing object triggers a best-effort
/// delete of that object followed by exactly one retry of the create. A
/// delete whose target is already gone counts as success.
pub struct CommandExecutor {
    backend: Arc<dyn ShapingBackend>,
}

impl CommandExecutor {
    pub fn new(backend: Arc<dyn ShapingBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ShapingBackend {
        self.backend.as_ref()
    }

    pub fn interface(&self) -> &str {
        self.backend.interface()
    }

    pub fn run(&self, op: &TcOp) -> Result<String, TcError> {
        let command = op.command_line(self.interface());
        self.settle(op, command, self.backend.apply(op))
    }

    /// Like [`run`](Self::run), but a create that collides with an existing
    /// object leaves that object in place and succeeds.
    pub fn ensure(&self, op: &TcOp) -> Result<String, TcError> {
        let command = op.command_line(self.interface());
        match self.backend.apply(op) {
            TcOutcome::Conflict(detail) => {
                debug!("{command}: already present ({})", detail.trim());
                Ok(String::new())
            }
            outcome => self.settle(op, command, outcome),
        }
    }

    fn settle(&self, op: &TcOp, command: String, outcome: TcOutcome) -> Result<String, TcError> {
        match outcome {
            TcOutcome::Applied(output) => {
                debug!("{command}: ok {}", output.trim());
                Ok(output)
            }
            TcOutcome::Missing(detail) if op.is_delete() => {
                debug!("{command}: already absent ({})", detail.trim());
                Ok(String::new())
            }
            TcOutcome::Conflict(detail) => self.recover(op, command, &detail),
            TcOutcome::Missing(detail) | TcOutcome::Failed(detail) => {
                error!("{command} failed: {}", detail.trim());
                Err(TcError::Failed { command, detail })
            }
        }
    }

    fn recover(&self, op: &TcOp, command: String, detail: &str) -> Result<String, TcError> {
        let Some(undo) = op.conflict_recovery() else {
            error!("{command}: {}", detail.trim());
            return Err(TcError::Conflict {
                command,
                detail: detail.to_owned(),
            });
        };

        warn!(
            "{command}: {}; deleting existing object and retrying",
            detail.trim()
        );
        let undo_command = undo.command_line(self.interface());
        match self.backend.apply(&undo) {
            TcOutcome::Applied(_) | TcOutcome::Missing(_) => debug!("{undo_command}: ok"),
            TcOutcome::Conflict(d) | TcOutcome::Failed(d) => {
                warn!("{undo_command} failed: {}", d.trim());
            }
        }

        match self.backend.apply(op) {
            TcOutcome::Applied(output) => {
                info!("{command}: applied after conflict recovery");
                Ok(output)
            }
            TcOutcome::Conflict(detail) => {
                error!("{command} still conflicts after recovery: {}", detail.trim());
                Err(TcError::Conflict { command, detail })
            }
            TcOutcome::Missing(detail) | TcOutcome::Failed(detail) => {
                error!("{command} failed after recovery: {}", detail.trim());
                Err(TcError::Failed { command, detail })
            }
        }
    }
}

//! Traffic shaping effectors for netops.
//!
//! This crate implements the layer that touches the kernel: shaping operations
//! (`TcOp`) with their literal `tc` command rendering, the `ShapingBackend`
//! trait returning classified outcomes, the production `TcCommandBackend` that
//! shells out to iproute2, an in-memory `MockBackend` for deterministic tests,
//! and prerequisite checks.

pub mod backend;
pub mod command;
pub mod mock;
pub mod ops;
pub mod prereq;

pub use backend::{select_backend, ShapingBackend, TcOutcome};
pub use command::TcCommandBackend;
pub use mock::MockBackend;
pub use ops::{Handle, HtbClass, PortFilter, PortMatch, TcOp, TcOpKind};
pub use prereq::{check_tc_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TcError {
    #[error("tc I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("{command}: conflicts with existing configuration: {detail}")]
    Conflict { command: String, detail: String },
    #[error("{command} failed: {detail}")]
    Failed { command: String, detail: String },
}

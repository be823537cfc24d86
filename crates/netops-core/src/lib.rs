//! Policy reconciliation engine for the netops slice bandwidth agent.
//!
//! This crate ties the schema types and the shaping backends together into the
//! `Engine`: the in-memory `PolicyStore` of slices and gateways, the
//! `ClassIdAllocator` for per-slice HTB class numbers, the conflict-recovering
//! `CommandExecutor`, and the reconciliation and lifecycle logic that keep the
//! interface's class hierarchy in step with the controller's desired state.

pub mod allocator;
pub mod config;
pub mod engine;
pub mod executor;
pub mod lifecycle;
pub mod store;

pub use allocator::ClassIdAllocator;
pub use config::EngineConfig;
pub use engine::Engine;
pub use executor::CommandExecutor;
pub use lifecycle::{validate_transition, SliceState};
pub use store::{PolicyStore, SliceGwInfo, SliceInfo};

use thiserror::Error;

/// Handle of the root HTB qdisc. Kept unusual to stay clear of any shaping
/// configuration other tools put on the interface.
pub const ROOT_HANDLE_ID: u32 = 17;

/// Class unclassified traffic falls into under the root qdisc.
pub const ROOT_DEFAULT_CLASS: u32 = 30;

/// Spacing between slice parent class numbers. Slice `n` gets parent class
/// `n * 11`, and its children may use the ten numbers that follow.
pub const PARENT_CLASS_STRIDE: u32 = 11;

pub const MAX_NUM_OF_SLICES: u32 = 100;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("SliceId {0} is not found")]
    SliceNotFound(String),
    #[error("could not find a free class ID for slice {0}")]
    ResourceExhausted(String),
    #[error(transparent)]
    Tc(#[from] netops_tc::TcError),
    #[error("invalid slice state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("engine state lock poisoned")]
    LockPoisoned,
}

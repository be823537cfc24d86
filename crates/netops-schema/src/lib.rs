//! Domain and wire types for the netops slice bandwidth agent.
//!
//! This crate defines the schema layer: identifier newtypes (`SliceId`,
//! `SliceName`, `GatewayId`), QoS profile and applied shaping parameters
//! (`SliceQosProfile`, `TcInfo`), gateway roles and lifecycle events, and the
//! JSON request/response bodies of the controller-facing RPC surface.

pub mod qos;
pub mod rpc;
pub mod types;

pub use qos::{ClassType, GatewayRole, LifecycleEvent, SliceQosProfile, TcInfo};
pub use rpc::{
    ConnectionContextRequest, ErrorResponse, GatewayView, SliceLifeCycleEventRequest,
    SliceQosProfileRequest, SliceView, StatusResponse,
};
pub use types::{GatewayId, SliceId, SliceName};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported class type '{0}'")]
    InvalidClassType(String),
    #[error("unknown slice gateway host type '{0}'")]
    InvalidGatewayRole(String),
    #[error("unknown slice lifecycle event '{0}'")]
    InvalidEvent(String),
}

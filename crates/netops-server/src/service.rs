//! Controller-facing RPC operations: request validation, cancellation, and
//! mapping of engine results onto status codes.

use netops_core::{CoreError, Engine, SliceGwInfo};
use netops_schema::{
    ClassType, ConnectionContextRequest, ErrorResponse, GatewayId, GatewayRole, LifecycleEvent,
    SliceId, SliceLifeCycleEventRequest, SliceName, SliceQosProfile, SliceQosProfileRequest,
    SliceView, StatusResponse,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{error, info, warn};

pub const QOS_ENFORCED: &str = "Slice QoS policy enforced successfully";
pub const LIFECYCLE_HANDLED: &str = "Slice life cycle event handled successfully";
pub const CONNECTION_CONTEXT_UPDATED: &str = "Connection Context Updated Successfully in netops pod";

const QOS_EMPTY: &str = "Qos profile message is empty";
const LIFECYCLE_EMPTY: &str = "Slice lifecycle message is empty";
const CONNECTION_CONTEXT_EMPTY: &str = "Connection Context is Empty";
const INVALID_NODE_PORT: &str = "Invalid Slice Gateway Node Port";
const INVALID_HOST_TYPE: &str = "Invalid Slice Gateway Host Type";
const CANCELED_UPDATE: &str = "Client canceled, ignoring qos update message.";
const CANCELED_CONTEXT: &str = "Client cancelled, abandoning.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    InvalidArgument,
    NotFound,
    ResourceExhausted,
    Canceled,
    Internal,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::InvalidArgument => "InvalidArgument",
            Code::NotFound => "NotFound",
            Code::ResourceExhausted => "ResourceExhausted",
            Code::Canceled => "Canceled",
            Code::Internal => "Internal",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            Code::InvalidArgument => 400,
            Code::NotFound => 404,
            Code::ResourceExhausted => 429,
            Code::Canceled => 499,
            Code::Internal => 500,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RPC failure: a status code plus a caller-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code.as_str().to_owned(),
            message: self.message.clone(),
        }
    }

    /// Map an engine error, prefixing its text with `context`.
    fn from_core(context: &str, err: &CoreError) -> Self {
        let code = match err {
            CoreError::InvalidInput(_) => Code::InvalidArgument,
            CoreError::SliceNotFound(_) => Code::NotFound,
            CoreError::ResourceExhausted(_) => Code::ResourceExhausted,
            CoreError::Tc(_) | CoreError::InvalidTransition { .. } | CoreError::LockPoisoned => {
                Code::Internal
            }
        };
        Self::new(code, format!("{context}: {err}"))
    }
}

/// Per-request cancellation state, captured when the request arrives.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    pub deadline: Option<SystemTime>,
    pub shutdown_requested: bool,
}

impl RequestContext {
    pub fn new(deadline: Option<SystemTime>, shutdown_requested: bool) -> Self {
        Self {
            deadline,
            shutdown_requested,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.shutdown_requested
            || self
                .deadline
                .is_some_and(|deadline| deadline <= SystemTime::now())
    }
}

/// The netops RPC service. Owns the engine every handler works against.
pub struct NetOpsService {
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
}

impl NetOpsService {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_shutdown(engine, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_shutdown(engine: Arc<Engine>, shutdown: Arc<AtomicBool>) -> Self {
        Self { engine, shutdown }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn update_slice_qos_profile(
        &self,
        ctx: &RequestContext,
        req: Option<SliceQosProfileRequest>,
    ) -> Result<StatusResponse, Status> {
        if ctx.is_canceled() {
            return Err(Status::new(Code::Canceled, CANCELED_UPDATE));
        }
        let req = req
            .filter(|r| !r.slice_id.is_empty() && !r.slice_name.is_empty())
            .ok_or_else(|| Status::invalid_argument(QOS_EMPTY))?;
        let class: ClassType = req
            .class_type
            .parse::<ClassType>()
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        info!(
            "received QoS profile {:?} for slice {} ({})",
            req.qos_profile_name, req.slice_id, req.slice_name
        );
        let profile = SliceQosProfile {
            profile_name: req.qos_profile_name,
            tc_type: req.tc_type,
            class,
            bw_ceiling: req.bw_ceiling,
            bw_guaranteed: req.bw_guaranteed,
            priority: req.priority,
            dscp_class: req.dscp_class,
        };

        self.engine
            .apply_qos_profile(
                &SliceId::new(req.slice_id),
                &SliceName::new(req.slice_name),
                &profile,
            )
            .map_err(|e| {
                error!("failed to enforce QoS policy: {e}");
                Status::from_core("Failed to enforce QoS policy", &e)
            })?;
        Ok(StatusResponse::new(QOS_ENFORCED))
    }

    pub fn update_slice_lifecycle_event(
        &self,
        ctx: &RequestContext,
        req: Option<SliceLifeCycleEventRequest>,
    ) -> Result<StatusResponse, Status> {
        if ctx.is_canceled() {
            return Err(Status::new(Code::Canceled, CANCELED_UPDATE));
        }
        let req = req
            .filter(|r| !r.slice_name.is_empty())
            .ok_or_else(|| Status::invalid_argument(LIFECYCLE_EMPTY))?;
        let event: LifecycleEvent = req
            .event
            .parse::<LifecycleEvent>()
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        self.engine
            .handle_lifecycle_event(&SliceName::new(req.slice_name), event)
            .map_err(|e| {
                error!("failed to handle slice lifecycle event: {e}");
                Status::from_core("Failed to handle slice lifecycle event", &e)
            })?;
        Ok(StatusResponse::new(LIFECYCLE_HANDLED))
    }

    pub fn update_connection_context(
        &self,
        ctx: &RequestContext,
        req: Option<ConnectionContextRequest>,
    ) -> Result<StatusResponse, Status> {
        if ctx.is_canceled() {
            return Err(Status::new(Code::Canceled, CANCELED_CONTEXT));
        }
        let req = req.ok_or_else(|| Status::invalid_argument(CONNECTION_CONTEXT_EMPTY))?;
        if req.local_slice_gw_node_port.is_empty() {
            return Err(Status::invalid_argument(INVALID_NODE_PORT));
        }
        let role: GatewayRole = req.local_slice_gw_host_type.parse().map_err(|e| {
            warn!("rejecting connection context: {e}");
            Status::invalid_argument(INVALID_HOST_TYPE)
        })?;

        let gateway = SliceGwInfo::new(
            GatewayId::new(req.local_slice_gw_id),
            role,
            req.local_slice_gw_node_port,
            req.remote_slice_gw_node_port,
        );
        self.engine
            .apply_connection_context(&SliceId::new(req.slice_id), gateway)
            .map_err(|e| {
                error!("failed to update connection context: {e}");
                Status::from_core("Failed to update connection context", &e)
            })?;
        Ok(StatusResponse::new(CONNECTION_CONTEXT_UPDATED))
    }

    pub fn slices(&self) -> Result<Vec<SliceView>, Status> {
        self.engine
            .snapshot()
            .map_err(|e| Status::from_core("Failed to read slice state", &e))
    }

    pub fn slice(&self, slice_id: &str) -> Result<SliceView, Status> {
        self.engine
            .slice(&SliceId::new(slice_id))
            .map_err(|e| Status::from_core("Failed to read slice state", &e))
    }
}

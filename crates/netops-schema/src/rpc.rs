//! JSON bodies exchanged with the slice controller.
//!
//! Every request field defaults when absent so that validation, not
//! deserialization, decides what an "empty" message is. Enum-valued fields are
//! carried as strings for the same reason.

use crate::qos::{GatewayRole, TcInfo};
use crate::types::{GatewayId, SliceId, SliceName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceQosProfileRequest {
    pub slice_id: String,
    pub slice_name: String,
    pub qos_profile_name: String,
    pub tc_type: String,
    pub class_type: String,
    pub bw_ceiling: u32,
    pub bw_guaranteed: u32,
    pub priority: u32,
    pub dscp_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceLifeCycleEventRequest {
    pub slice_name: String,
    pub event: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionContextRequest {
    pub slice_id: String,
    pub local_slice_gw_id: String,
    pub local_slice_gw_host_type: String,
    pub local_slice_gw_node_port: String,
    pub remote_slice_gw_node_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status_msg: String,
}

impl StatusResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            status_msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Read-only view of one gateway, as returned by the state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayView {
    pub gateway_id: GatewayId,
    pub role: GatewayRole,
    pub local_port: String,
    pub remote_port: String,
    pub tc_configured: bool,
}

/// Read-only view of one slice, as returned by the state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceView {
    pub slice_id: SliceId,
    pub slice_name: SliceName,
    pub parent_class_id: u32,
    pub parent_class_fq_id: String,
    pub leaf_class_fq_id: String,
    pub tc_inited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tc: Option<TcInfo>,
    pub gateways: Vec<GatewayView>,
}

use crate::lifecycle::SliceState;
use crate::ROOT_HANDLE_ID;
use netops_schema::{
    GatewayId, GatewayRole, GatewayView, SliceId, SliceName, SliceQosProfile, SliceView, TcInfo,
};
use netops_tc::{Handle, PortMatch};
use std::collections::BTreeMap;

/// A slice gateway attached to this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceGwInfo {
    pub gateway_id: GatewayId,
    pub role: GatewayRole,
    pub local_port: String,
    pub remote_port: String,
    /// Whether the port filter for this gateway is installed.
    pub tc_configured: bool,
}

impl SliceGwInfo {
    pub fn new(
        gateway_id: GatewayId,
        role: GatewayRole,
        local_port: impl Into<String>,
        remote_port: impl Into<String>,
    ) -> Self {
        Self {
            gateway_id,
            role,
            local_port: local_port.into(),
            remote_port: remote_port.into(),
            tc_configured: false,
        }
    }

    /// Same role and ports as `other`, ignoring filter state.
    pub fn same_endpoint(&self, other: &SliceGwInfo) -> bool {
        self.role == other.role
            && self.local_port == other.local_port
            && self.remote_port == other.remote_port
    }

    /// Port match for this gateway's filter: a client matches tunnel traffic
    /// by the remote destination port, a server by its local source port.
    /// `None` when the relevant port is not a valid port number.
    pub fn filter_port(&self) -> Option<PortMatch> {
        match self.role {
            GatewayRole::Client => self.remote_port.parse().ok().map(PortMatch::Destination),
            GatewayRole::Server => self.local_port.parse().ok().map(PortMatch::Source),
        }
    }

    pub fn view(&self) -> GatewayView {
        GatewayView {
            gateway_id: self.gateway_id.clone(),
            role: self.role,
            local_port: self.local_port.clone(),
            remote_port: self.remote_port.clone(),
            tc_configured: self.tc_configured,
        }
    }
}

/// Everything known about one slice on this node.
#[derive(Debug, Clone)]
pub struct SliceInfo {
    pub slice_name: SliceName,
    pub qos_profile: SliceQosProfile,
    pub parent_class_id: u32,
    pub parent_class_fq_id: String,
    pub leaf_class_fq_id: String,
    /// Whether the parent class exists on the interface.
    pub tc_inited: bool,
    /// Shaping parameters last applied successfully.
    pub tc: Option<TcInfo>,
    pub gateways: BTreeMap<GatewayId, SliceGwInfo>,
}

impl SliceInfo {
    pub fn new(slice_name: SliceName, qos_profile: SliceQosProfile, parent_class_id: u32) -> Self {
        Self {
            slice_name,
            qos_profile,
            parent_class_id,
            parent_class_fq_id: format!("{ROOT_HANDLE_ID}:{parent_class_id}"),
            leaf_class_fq_id: format!("{ROOT_HANDLE_ID}:{}", parent_class_id + 1),
            tc_inited: false,
            tc: None,
            gateways: BTreeMap::new(),
        }
    }

    pub fn parent_handle(&self) -> Handle {
        Handle::new(ROOT_HANDLE_ID, self.parent_class_id)
    }

    pub fn leaf_handle(&self) -> Handle {
        Handle::new(ROOT_HANDLE_ID, self.parent_class_id + 1)
    }

    pub fn state(&self) -> SliceState {
        if self.tc_inited {
            SliceState::Initialized
        } else {
            SliceState::Provisioned
        }
    }

    /// Mark every gateway filter as needing reinstallation.
    pub fn invalidate_gateways(&mut self) {
        for gw in self.gateways.values_mut() {
            gw.tc_configured = false;
        }
    }

    pub fn pending_gateways(&self) -> usize {
        self.gateways.values().filter(|gw| !gw.tc_configured).count()
    }

    pub fn view(&self, slice_id: &SliceId) -> SliceView {
        SliceView {
            slice_id: slice_id.clone(),
            slice_name: self.slice_name.clone(),
            parent_class_id: self.parent_class_id,
            parent_class_fq_id: self.parent_class_fq_id.clone(),
            leaf_class_fq_id: self.leaf_class_fq_id.clone(),
            tc_inited: self.tc_inited,
            tc: self.tc,
            gateways: self.gateways.values().map(SliceGwInfo::view).collect(),
        }
    }
}

/// In-memory map of slice ID to [`SliceInfo`]. Performs no I/O and no locking
/// of its own; the engine serializes access to it.
#[derive(Debug, Default, Clone)]
pub struct PolicyStore {
    slices: BTreeMap<SliceId, SliceInfo>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slice_id: &SliceId) -> Option<&SliceInfo> {
        self.slices.get(slice_id)
    }

    pub fn get_mut(&mut self, slice_id: &SliceId) -> Option<&mut SliceInfo> {
        self.slices.get_mut(slice_id)
    }

    pub fn upsert(&mut self, slice_id: SliceId, info: SliceInfo) -> Option<SliceInfo> {
        self.slices.insert(slice_id, info)
    }

    pub fn remove(&mut self, slice_id: &SliceId) -> Option<SliceInfo> {
        self.slices.remove(slice_id)
    }

    pub fn all(&self) -> impl Iterator<Item = (&SliceId, &SliceInfo)> {
        self.slices.iter()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = (&SliceId, &mut SliceInfo)> {
        self.slices.iter_mut()
    }

    /// Linear scan by slice name. Names are assumed unique across slices.
    pub fn find_by_name(&self, slice_name: &SliceName) -> Option<(&SliceId, &SliceInfo)> {
        self.slices
            .iter()
            .find(|(_, info)| &info.slice_name == slice_name)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SliceView> {
        self.slices.iter().map(|(id, info)| info.view(id)).collect()
    }
}

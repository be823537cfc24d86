use crate::allocator::ClassIdAllocator;
use crate::config::EngineConfig;
use crate::executor::CommandExecutor;
use crate::lifecycle::{validate_transition, SliceState};
use crate::store::{PolicyStore, SliceGwInfo, SliceInfo};
use crate::{CoreError, ROOT_DEFAULT_CLASS, ROOT_HANDLE_ID};
use netops_schema::{LifecycleEvent, SliceId, SliceName, SliceQosProfile, SliceView, TcInfo};
use netops_tc::{select_backend, Handle, HtbClass, PortFilter, ShapingBackend, TcOp};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

const PARENT_CLASS_BURST: &str = "64k";
const LEAF_CLASS_BURST: &str = "32k";
const SFQ_PERTURB_SECS: u32 = 10;

const ROOT: Handle = Handle::qdisc(ROOT_HANDLE_ID);

struct EngineState {
    store: PolicyStore,
    allocator: ClassIdAllocator,
}

/// Reconciles the controller's slice policy with the class hierarchy on one
/// network interface.
///
/// All mutating entry points take the same lock and hold it across the whole
/// command sequence, so requests are applied one at a time and the policy
/// store never observes a half-applied change from another request.
pub struct Engine {
    executor: CommandExecutor,
    state: Mutex<EngineState>,
}

impl Engine {
    pub fn new(backend: Arc<dyn ShapingBackend>) -> Self {
        Self {
            executor: CommandExecutor::new(backend),
            state: Mutex::new(EngineState {
                store: PolicyStore::new(),
                allocator: ClassIdAllocator::new(),
            }),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, CoreError> {
        let backend = select_backend(&config.backend, &config.interface)?;
        Ok(Self::new(Arc::from(backend)))
    }

    pub fn interface(&self) -> &str {
        self.executor.interface()
    }

    pub fn backend(&self) -> &dyn ShapingBackend {
        self.executor.backend()
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, CoreError> {
        self.state.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Remove any shaping configuration left on the interface by a previous
    /// run, so the first slice starts from a clean root.
    pub fn bootstrap(&self) -> Result<(), CoreError> {
        let _state = self.lock()?;
        info!("clearing stale root qdisc on {}", self.interface());
        self.executor.run(&TcOp::DeleteRootQdisc)?;
        Ok(())
    }

    /// Apply a slice's QoS profile, creating the slice on first sight.
    ///
    /// Unchanged shaping parameters issue no parent/leaf/SFQ commands. Gateway
    /// filters still pending are (re)installed on every call; a filter failure
    /// is logged and never fails the request.
    pub fn apply_qos_profile(
        &self,
        slice_id: &SliceId,
        slice_name: &SliceName,
        profile: &SliceQosProfile,
    ) -> Result<(), CoreError> {
        if slice_id.is_empty() || slice_name.is_empty() {
            return Err(CoreError::InvalidInput(
                "slice id and slice name are required".to_owned(),
            ));
        }

        let mut guard = self.lock()?;
        let state = &mut *guard;

        if state.store.get(slice_id).is_none() {
            if state.store.is_empty() {
                self.executor.run(&TcOp::AddRootQdisc {
                    handle: ROOT_HANDLE_ID,
                    default_class: ROOT_DEFAULT_CLASS,
                })?;
                info!("created root qdisc {ROOT} on {}", self.interface());
            }
            let class_id = state.allocator.allocate(slice_name)?;
            let info = SliceInfo::new(slice_name.clone(), profile.clone(), class_id);
            validate_transition(SliceState::Unknown, info.state())?;
            info!("slice {slice_id} ({slice_name}) assigned parent class {class_id}");
            state.store.upsert(slice_id.clone(), info);
        }

        let info = state
            .store
            .get_mut(slice_id)
            .ok_or_else(|| CoreError::SliceNotFound(slice_id.to_string()))?;
        info.qos_profile = profile.clone();

        self.configure_slice_tc(slice_id, info, TcInfo::from(profile))?;
        self.configure_gateway_filters(slice_id, info);
        Ok(())
    }

    fn configure_slice_tc(
        &self,
        slice_id: &SliceId,
        info: &mut SliceInfo,
        new_tc: TcInfo,
    ) -> Result<(), CoreError> {
        if info.tc == Some(new_tc) {
            info!("slice {slice_id}: no change in slice TC params, ignoring update");
            return Ok(());
        }
        match info.tc {
            Some(old) => info!("slice {slice_id}: TC params changed from {old} to {new_tc}"),
            None => info!("slice {slice_id}: applying TC params {new_tc}"),
        }

        let parent = HtbClass {
            parent: ROOT,
            classid: info.parent_handle(),
            rate_kbit: new_tc.bw_ceiling,
            ceil_kbit: None,
            burst: PARENT_CLASS_BURST,
        };
        let leaf = HtbClass {
            parent: info.parent_handle(),
            classid: info.leaf_handle(),
            rate_kbit: new_tc.bw_guaranteed,
            ceil_kbit: Some(new_tc.bw_ceiling),
            burst: LEAF_CLASS_BURST,
        };
        let sfq = TcOp::AddSfq {
            parent: info.leaf_handle(),
            handle: info.parent_class_id,
            perturb: SFQ_PERTURB_SECS,
        };

        // Gateway filters point at the leaf, and the kernel refuses to delete
        // a class in use, so an initialized slice is changed in place.
        if info.tc_inited {
            self.executor.run(&TcOp::ReplaceClass(parent))?;
            self.executor.run(&TcOp::ReplaceClass(leaf))?;
            self.executor.ensure(&sfq)?;
        } else {
            self.executor.run(&TcOp::AddClass(parent))?;
            validate_transition(info.state(), SliceState::Initialized)?;
            info.tc_inited = true;
            self.executor.run(&TcOp::AddClass(leaf))?;
            self.executor.run(&sfq)?;
        }

        info.tc = Some(new_tc);
        info!(
            "slice {slice_id}: classes {} / {} configured",
            info.parent_class_fq_id, info.leaf_class_fq_id
        );
        self.log_tc_state();
        Ok(())
    }

    fn configure_gateway_filters(&self, slice_id: &SliceId, info: &mut SliceInfo) {
        let Some(tc) = info.tc else {
            return;
        };
        let flowid = info.leaf_handle();

        for gw in info.gateways.values_mut().filter(|gw| !gw.tc_configured) {
            let Some(port) = gw.filter_port() else {
                warn!(
                    "slice {slice_id}: gateway {} has no usable {} port (local {:?}, remote {:?}); filter left pending",
                    gw.gateway_id, gw.role, gw.local_port, gw.remote_port
                );
                continue;
            };
            let op = TcOp::AddFilter(PortFilter {
                parent: ROOT,
                prio: tc.priority,
                port,
                flowid,
            });
            match self.executor.run(&op) {
                Ok(_) => {
                    gw.tc_configured = true;
                    info!(
                        "slice {slice_id}: filter for gateway {} ({}) steers to {flowid}",
                        gw.gateway_id, gw.role
                    );
                }
                Err(e) => error!(
                    "slice {slice_id}: failed to install filter for gateway {}: {e}",
                    gw.gateway_id
                ),
            }
        }

        let pending = info.pending_gateways();
        if pending > 0 {
            warn!("slice {slice_id}: {pending} gateway filter(s) still pending");
        }
    }

    fn log_tc_state(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        match self.executor.backend().show() {
            Ok(dump) => debug!("tc state on {}:\n{dump}", self.interface()),
            Err(e) => warn!("failed to query tc state on {}: {e}", self.interface()),
        }
    }

    /// Record a gateway's connection context for a known slice.
    ///
    /// The filter itself is installed by the next QoS reconciliation of the
    /// slice. Updates for unknown slices are dropped.
    pub fn apply_connection_context(
        &self,
        slice_id: &SliceId,
        gateway: SliceGwInfo,
    ) -> Result<(), CoreError> {
        let mut state = self.lock()?;
        let Some(info) = state.store.get_mut(slice_id) else {
            info!(
                "slice {slice_id} not known yet; dropping connection context for gateway {}",
                gateway.gateway_id
            );
            return Ok(());
        };

        match info.gateways.get_mut(&gateway.gateway_id) {
            None => {
                info!(
                    "slice {slice_id}: registered gateway {} ({})",
                    gateway.gateway_id, gateway.role
                );
                info.gateways.insert(gateway.gateway_id.clone(), SliceGwInfo {
                    tc_configured: false,
                    ..gateway
                });
            }
            Some(existing) if existing.same_endpoint(&gateway) => {
                debug!(
                    "slice {slice_id}: gateway {} unchanged",
                    gateway.gateway_id
                );
            }
            Some(existing) => {
                info!(
                    "slice {slice_id}: gateway {} changed, filter will be reinstalled",
                    gateway.gateway_id
                );
                *existing = SliceGwInfo {
                    tc_configured: false,
                    ..gateway
                };
            }
        }
        Ok(())
    }

    /// Handle a slice lifecycle event. Only deletion does any work: it tears
    /// down the slice's filters and classes and releases its class ID.
    pub fn handle_lifecycle_event(
        &self,
        slice_name: &SliceName,
        event: LifecycleEvent,
    ) -> Result<(), CoreError> {
        info!("slice {slice_name}: lifecycle event {event}");
        if event != LifecycleEvent::Delete {
            return Ok(());
        }

        let mut guard = self.lock()?;
        let state = &mut *guard;

        let Some((slice_id, info)) = state.store.find_by_name(slice_name) else {
            info!("slice {slice_name} not known; nothing to delete");
            return Ok(());
        };
        let slice_id = slice_id.clone();
        let from = info.state();
        let class_id = info.parent_class_id;
        let (parent, leaf) = (info.parent_handle(), info.leaf_handle());

        self.executor
            .run(&TcOp::DeleteFilters {
                parent: ROOT,
                prio: None,
            })
            .inspect_err(|e| error!("slice {slice_id}: failed to delete filters: {e}"))?;

        // Every slice's filters are gone from the kernel now, whatever
        // happens to the class deletes below.
        for (_, other) in state.store.all_mut() {
            other.invalidate_gateways();
        }

        if from == SliceState::Initialized {
            self.delete_slice_classes(&slice_id, parent, leaf)?;
        }
        validate_transition(from, SliceState::Deleted)?;

        state.allocator.release(class_id);
        state.store.remove(&slice_id);
        info!("slice {slice_id} ({slice_name}) deleted, class {class_id} released");

        if state.store.is_empty() {
            info!("no slices left; removing root qdisc");
            if let Err(e) = self.executor.run(&TcOp::DeleteRootQdisc) {
                error!("failed to remove root qdisc: {e}");
            }
        }
        Ok(())
    }

    fn delete_slice_classes(
        &self,
        slice_id: &SliceId,
        parent: Handle,
        leaf: Handle,
    ) -> Result<(), CoreError> {
        if let Err(e) = self.executor.run(&TcOp::DeleteClass {
            parent,
            classid: leaf,
        }) {
            error!("slice {slice_id}: failed to delete leaf class: {e}");
        }
        self.executor
            .run(&TcOp::DeleteClass {
                parent: ROOT,
                classid: parent,
            })
            .inspect_err(|e| error!("slice {slice_id}: failed to delete parent class: {e}"))?;
        Ok(())
    }

    /// Serializable view of every slice, ordered by slice ID.
    pub fn snapshot(&self) -> Result<Vec<SliceView>, CoreError> {
        Ok(self.lock()?.store.snapshot())
    }

    pub fn slice(&self, slice_id: &SliceId) -> Result<SliceView, CoreError> {
        let state = self.lock()?;
        state
            .store
            .get(slice_id)
            .map(|info| info.view(slice_id))
            .ok_or_else(|| CoreError::SliceNotFound(slice_id.to_string()))
    }

    pub fn slice_count(&self) -> Result<usize, CoreError> {
        Ok(self.lock()?.store.len())
    }
}

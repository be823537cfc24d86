use crate::backend::{ShapingBackend, TcOutcome};
use crate::ops::{Handle, HtbClass, PortFilter, TcOp, TcOpKind};
use crate::TcError;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

const EXISTS: &str = "RTNETLINK answers: File exists";
const NO_ENTRY: &str = "RTNETLINK answers: No such file or directory";
const IN_USE: &str = "Error: HTB class in use.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClass {
    pub parent: Handle,
    pub rate_kbit: u32,
    pub ceil_kbit: Option<u32>,
}

#[derive(Default)]
struct KernelModel {
    root: Option<u32>,
    classes: BTreeMap<Handle, MockClass>,
    /// Leaf qdisc major -> class it hangs under.
    qdiscs: BTreeMap<u32, Handle>,
    filters: Vec<PortFilter>,
    history: Vec<TcOp>,
    injected: Vec<(TcOpKind, TcOutcome)>,
}

impl KernelModel {
    fn parent_exists(&self, parent: Handle) -> bool {
        if parent.is_qdisc() {
            self.root == Some(parent.major)
        } else {
            self.classes.contains_key(&parent)
        }
    }

    fn put_class(&mut self, class: &HtbClass) {
        self.classes.insert(
            class.classid,
            MockClass {
                parent: class.parent,
                rate_kbit: class.rate_kbit,
                ceil_kbit: class.ceil_kbit,
            },
        );
    }

    /// A class together with its descendants.
    fn class_tree(&self, classid: Handle) -> Vec<Handle> {
        let mut doomed = vec![classid];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(
                self.classes
                    .iter()
                    .filter(|(_, c)| c.parent == current)
                    .map(|(id, _)| *id),
            );
            i += 1;
        }
        doomed
    }

    /// Remove a class together with its descendants and their qdiscs.
    fn remove_class_tree(&mut self, classid: Handle) {
        let doomed = self.class_tree(classid);
        for id in &doomed {
            self.classes.remove(id);
        }
        self.qdiscs.retain(|_, parent| !doomed.contains(parent));
    }

    fn apply(&mut self, op: &TcOp) -> TcOutcome {
        match op {
            TcOp::AddRootQdisc { handle, .. } => {
                if self.root.is_some() {
                    return TcOutcome::Conflict(EXISTS.to_owned());
                }
                self.root = Some(*handle);
            }
            TcOp::DeleteRootQdisc => {
                if self.root.take().is_none() {
                    return TcOutcome::Missing(
                        "Error: Cannot delete qdisc with handle of zero.".to_owned(),
                    );
                }
                self.classes.clear();
                self.qdiscs.clear();
                self.filters.clear();
            }
            TcOp::AddClass(class) => {
                if !self.parent_exists(class.parent) {
                    return TcOutcome::Failed(NO_ENTRY.to_owned());
                }
                if self.classes.contains_key(&class.classid) {
                    return TcOutcome::Conflict(EXISTS.to_owned());
                }
                self.put_class(class);
            }
            TcOp::ReplaceClass(class) => {
                if !self.parent_exists(class.parent) {
                    return TcOutcome::Failed(NO_ENTRY.to_owned());
                }
                self.put_class(class);
            }
            TcOp::DeleteClass { classid, .. } => {
                if !self.classes.contains_key(classid) {
                    return TcOutcome::Missing(NO_ENTRY.to_owned());
                }
                let tree = self.class_tree(*classid);
                if self.filters.iter().any(|f| tree.contains(&f.flowid)) {
                    return TcOutcome::Failed(IN_USE.to_owned());
                }
                self.remove_class_tree(*classid);
            }
            TcOp::AddSfq { parent, handle, .. } => {
                if !self.classes.contains_key(parent) {
                    return TcOutcome::Failed(NO_ENTRY.to_owned());
                }
                if self.qdiscs.contains_key(handle) {
                    return TcOutcome::Conflict(EXISTS.to_owned());
                }
                self.qdiscs.insert(*handle, *parent);
            }
            TcOp::DeleteQdisc { handle, .. } => {
                if self.qdiscs.remove(handle).is_none() {
                    return TcOutcome::Missing(NO_ENTRY.to_owned());
                }
            }
            TcOp::AddFilter(filter) => {
                if !self.parent_exists(filter.parent) {
                    return TcOutcome::Failed(NO_ENTRY.to_owned());
                }
                self.filters.push(filter.clone());
            }
            TcOp::DeleteFilters { parent, prio } => {
                if !self.parent_exists(*parent) {
                    return TcOutcome::Missing(NO_ENTRY.to_owned());
                }
                self.filters
                    .retain(|f| f.parent != *parent || prio.is_some_and(|p| f.prio != p));
            }
        }
        TcOutcome::Applied(String::new())
    }
}

/// In-memory stand-in for the kernel's traffic control state.
///
/// Models the subset of `tc` semantics the engine relies on: creates collide
/// with existing objects, deletes of absent objects report them missing, and
/// deleting a class or the root qdisc cascades to everything beneath it. A
/// class that a filter steers traffic to cannot be deleted. Every applied
/// operation is recorded, and failures or conflicts can be injected per
/// operation kind.
pub struct MockBackend {
    interface: String,
    state: Mutex<KernelModel>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("eth0")
    }
}

impl MockBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            state: Mutex::new(KernelModel::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KernelModel> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `op` without recording it, as leftover state from an earlier run.
    pub fn preload(&self, op: &TcOp) -> TcOutcome {
        self.lock().apply(op)
    }

    /// Make the next operation of `kind` fail. Calls stack.
    pub fn fail_next(&self, kind: TcOpKind) {
        self.lock()
            .injected
            .push((kind, TcOutcome::Failed("injected failure".to_owned())));
    }

    /// Make the next operation of `kind` report that its object exists.
    pub fn conflict_next(&self, kind: TcOpKind) {
        self.lock()
            .injected
            .push((kind, TcOutcome::Conflict(EXISTS.to_owned())));
    }

    /// Every operation passed to [`ShapingBackend::apply`], in order.
    pub fn history(&self) -> Vec<TcOp> {
        self.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn has_root(&self) -> bool {
        self.lock().root.is_some()
    }

    pub fn class(&self, classid: Handle) -> Option<MockClass> {
        self.lock().classes.get(&classid).cloned()
    }

    pub fn class_ids(&self) -> Vec<Handle> {
        self.lock().classes.keys().copied().collect()
    }

    pub fn has_qdisc(&self, handle: u32) -> bool {
        self.lock().qdiscs.contains_key(&handle)
    }

    pub fn filters(&self) -> Vec<PortFilter> {
        self.lock().filters.clone()
    }
}

impl ShapingBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn interface(&self) -> &str {
        &self.interface
    }

    fn available(&self) -> bool {
        true
    }

    fn apply(&self, op: &TcOp) -> TcOutcome {
        let mut state = self.lock();
        state.history.push(op.clone());
        if let Some(pos) = state.injected.iter().position(|(k, _)| *k == op.kind()) {
            return state.injected.remove(pos).1;
        }
        state.apply(op)
    }

    fn show(&self) -> Result<String, TcError> {
        let state = self.lock();
        let mut out = String::new();
        if let Some(root) = state.root {
            let _ = writeln!(out, "qdisc htb {root}: dev {} root", self.interface);
        }
        for (handle, parent) in &state.qdiscs {
            let _ = writeln!(out, "qdisc sfq {handle}: dev {} parent {parent}", self.interface);
        }
        for (id, class) in &state.classes {
            let _ = write!(
                out,
                "class htb {id} parent {} rate {}Kbit",
                class.parent, class.rate_kbit
            );
            if let Some(ceil) = class.ceil_kbit {
                let _ = write!(out, " ceil {ceil}Kbit");
            }
            out.push('\n');
        }
        for filter in &state.filters {
            let _ = writeln!(
                out,
                "filter parent {} prio {} u32 {:?} flowid {}",
                filter.parent, filter.prio, filter.port, filter.flowid
            );
        }
        Ok(out)
    }
}

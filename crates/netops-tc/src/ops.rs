//! Shaping operations and their `tc` command-line rendering.

use std::fmt;

/// A qdisc or class handle in `major:minor` notation.
///
/// A zero minor denotes the qdisc itself and renders as `major:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    pub major: u32,
    pub minor: u32,
}

impl Handle {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub const fn qdisc(major: u32) -> Self {
        Self { major, minor: 0 }
    }

    pub const fn is_qdisc(&self) -> bool {
        self.minor == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{}:", self.major)
        } else {
            write!(f, "{}:{}", self.major, self.minor)
        }
    }
}

/// An HTB class definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtbClass {
    pub parent: Handle,
    pub classid: Handle,
    pub rate_kbit: u32,
    pub ceil_kbit: Option<u32>,
    pub burst: &'static str,
}

/// Which side of the flow a port filter matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortMatch {
    Destination(u16),
    Source(u16),
}

/// A u32 filter steering packets with a given port into a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortFilter {
    pub parent: Handle,
    pub prio: u32,
    pub port: PortMatch,
    pub flowid: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcOp {
    AddRootQdisc { handle: u32, default_class: u32 },
    DeleteRootQdisc,
    AddClass(HtbClass),
    ReplaceClass(HtbClass),
    DeleteClass { parent: Handle, classid: Handle },
    AddSfq { parent: Handle, handle: u32, perturb: u32 },
    DeleteQdisc { parent: Handle, handle: u32 },
    AddFilter(PortFilter),
    DeleteFilters { parent: Handle, prio: Option<u32> },
}

/// Discriminant of a [`TcOp`], used to match operations without their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcOpKind {
    AddRootQdisc,
    DeleteRootQdisc,
    AddClass,
    ReplaceClass,
    DeleteClass,
    AddSfq,
    DeleteQdisc,
    AddFilter,
    DeleteFilters,
}

fn push_class_args(args: &mut Vec<String>, class: &HtbClass) {
    args.extend([
        "parent".to_owned(),
        class.parent.to_string(),
        "classid".to_owned(),
        class.classid.to_string(),
        "htb".to_owned(),
        "rate".to_owned(),
        format!("{}kbit", class.rate_kbit),
    ]);
    if let Some(ceil) = class.ceil_kbit {
        args.extend(["ceil".to_owned(), format!("{ceil}kbit")]);
    }
    args.extend(["burst".to_owned(), class.burst.to_owned()]);
}

impl TcOp {
    pub fn kind(&self) -> TcOpKind {
        match self {
            TcOp::AddRootQdisc { .. } => TcOpKind::AddRootQdisc,
            TcOp::DeleteRootQdisc => TcOpKind::DeleteRootQdisc,
            TcOp::AddClass(_) => TcOpKind::AddClass,
            TcOp::ReplaceClass(_) => TcOpKind::ReplaceClass,
            TcOp::DeleteClass { .. } => TcOpKind::DeleteClass,
            TcOp::AddSfq { .. } => TcOpKind::AddSfq,
            TcOp::DeleteQdisc { .. } => TcOpKind::DeleteQdisc,
            TcOp::AddFilter(_) => TcOpKind::AddFilter,
            TcOp::DeleteFilters { .. } => TcOpKind::DeleteFilters,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            TcOp::DeleteRootQdisc
                | TcOp::DeleteClass { .. }
                | TcOp::DeleteQdisc { .. }
                | TcOp::DeleteFilters { .. }
        )
    }

    /// The delete that clears the object a create collided with.
    ///
    /// Only qdisc and class creates have one. Filters get kernel-assigned
    /// handles, and the only delete that could reach one also clears every
    /// other filter sharing its priority.
    pub fn conflict_recovery(&self) -> Option<TcOp> {
        match self {
            TcOp::AddRootQdisc { .. } => Some(TcOp::DeleteRootQdisc),
            TcOp::AddClass(class) => Some(TcOp::DeleteClass {
                parent: class.parent,
                classid: class.classid,
            }),
            TcOp::AddSfq { parent, handle, .. } => Some(TcOp::DeleteQdisc {
                parent: *parent,
                handle: *handle,
            }),
            _ => None,
        }
    }

    /// Arguments passed to the `tc` binary for this operation on `dev`.
    pub fn args(&self, dev: &str) -> Vec<String> {
        let (object, verb) = match self {
            TcOp::AddRootQdisc { .. } | TcOp::AddSfq { .. } => ("qdisc", "add"),
            TcOp::DeleteRootQdisc | TcOp::DeleteQdisc { .. } => ("qdisc", "delete"),
            TcOp::AddClass(_) => ("class", "add"),
            TcOp::ReplaceClass(_) => ("class", "replace"),
            TcOp::DeleteClass { .. } => ("class", "delete"),
            TcOp::AddFilter(_) => ("filter", "add"),
            TcOp::DeleteFilters { .. } => ("filter", "delete"),
        };
        let mut args = vec![
            object.to_owned(),
            verb.to_owned(),
            "dev".to_owned(),
            dev.to_owned(),
        ];

        match self {
            TcOp::AddRootQdisc {
                handle,
                default_class,
            } => {
                args.extend([
                    "root".to_owned(),
                    "handle".to_owned(),
                    Handle::qdisc(*handle).to_string(),
                    "htb".to_owned(),
                    "default".to_owned(),
                    default_class.to_string(),
                ]);
            }
            TcOp::DeleteRootQdisc => {
                args.push("root".to_owned());
            }
            TcOp::AddClass(class) | TcOp::ReplaceClass(class) => {
                push_class_args(&mut args, class);
            }
            TcOp::DeleteClass { parent, classid } => {
                args.extend([
                    "parent".to_owned(),
                    parent.to_string(),
                    "classid".to_owned(),
                    classid.to_string(),
                ]);
            }
            TcOp::AddSfq {
                parent,
                handle,
                perturb,
            } => {
                args.extend([
                    "parent".to_owned(),
                    parent.to_string(),
                    "handle".to_owned(),
                    Handle::qdisc(*handle).to_string(),
                    "sfq".to_owned(),
                    "perturb".to_owned(),
                    perturb.to_string(),
                ]);
            }
            TcOp::DeleteQdisc { parent, handle } => {
                args.extend([
                    "parent".to_owned(),
                    parent.to_string(),
                    "handle".to_owned(),
                    Handle::qdisc(*handle).to_string(),
                ]);
            }
            TcOp::AddFilter(filter) => {
                let (selector, port) = match filter.port {
                    PortMatch::Destination(port) => ("dport", port),
                    PortMatch::Source(port) => ("sport", port),
                };
                args.extend([
                    "protocol".to_owned(),
                    "ip".to_owned(),
                    "parent".to_owned(),
                    filter.parent.to_string(),
                    "prio".to_owned(),
                    filter.prio.to_string(),
                    "u32".to_owned(),
                    "match".to_owned(),
                    "ip".to_owned(),
                    selector.to_owned(),
                    port.to_string(),
                    "0xffff".to_owned(),
                    "flowid".to_owned(),
                    filter.flowid.to_string(),
                ]);
            }
            TcOp::DeleteFilters { parent, prio } => {
                args.extend(["parent".to_owned(), parent.to_string()]);
                if let Some(prio) = prio {
                    args.extend(["prio".to_owned(), prio.to_string()]);
                }
            }
        }
        args
    }

    /// Full command line, for logs and error messages.
    pub fn command_line(&self, dev: &str) -> String {
        let mut line = String::from("tc");
        for arg in self.args(dev) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Handle = Handle::qdisc(17);

    #[test]
    fn handle_display() {
        assert_eq!(Handle::new(17, 11).to_string(), "17:11");
        assert_eq!(ROOT.to_string(), "17:");
        assert!(ROOT.is_qdisc());
    }

    #[test]
    fn root_qdisc_commands() {
        let add = TcOp::AddRootQdisc {
            handle: 17,
            default_class: 30,
        };
        assert_eq!(
            add.command_line("eth0"),
            "tc qdisc add dev eth0 root handle 17: htb default 30"
        );
        assert_eq!(
            TcOp::DeleteRootQdisc.command_line("eth0"),
            "tc qdisc delete dev eth0 root"
        );
    }

    #[test]
    fn parent_and_leaf_class_commands() {
        let parent = HtbClass {
            parent: ROOT,
            classid: Handle::new(17, 11),
            rate_kbit: 1000,
            ceil_kbit: None,
            burst: "64k",
        };
        assert_eq!(
            TcOp::AddClass(parent.clone()).command_line("eth0"),
            "tc class add dev eth0 parent 17: classid 17:11 htb rate 1000kbit burst 64k"
        );
        assert_eq!(
            TcOp::ReplaceClass(parent).command_line("eth0"),
            "tc class replace dev eth0 parent 17: classid 17:11 htb rate 1000kbit burst 64k"
        );

        let leaf = HtbClass {
            parent: Handle::new(17, 11),
            classid: Handle::new(17, 12),
            rate_kbit: 500,
            ceil_kbit: Some(1000),
            burst: "32k",
        };
        assert_eq!(
            TcOp::AddClass(leaf).command_line("eth0"),
            "tc class add dev eth0 parent 17:11 classid 17:12 htb rate 500kbit ceil 1000kbit burst 32k"
        );
    }

    #[test]
    fn sfq_command() {
        let op = TcOp::AddSfq {
            parent: Handle::new(17, 12),
            handle: 11,
            perturb: 10,
        };
        assert_eq!(
            op.command_line("eth0"),
            "tc qdisc add dev eth0 parent 17:12 handle 11: sfq perturb 10"
        );
    }

    #[test]
    fn filter_commands_by_direction() {
        let client = TcOp::AddFilter(PortFilter {
            parent: ROOT,
            prio: 1,
            port: PortMatch::Destination(30001),
            flowid: Handle::new(17, 12),
        });
        assert_eq!(
            client.command_line("eth0"),
            "tc filter add dev eth0 protocol ip parent 17: prio 1 u32 match ip dport 30001 0xffff flowid 17:12"
        );
        let server = TcOp::AddFilter(PortFilter {
            parent: ROOT,
            prio: 2,
            port: PortMatch::Source(30002),
            flowid: Handle::new(17, 23),
        });
        assert!(server.command_line("eth0").contains("match ip sport 30002 0xffff"));
        assert_eq!(
            TcOp::DeleteFilters {
                parent: ROOT,
                prio: None
            }
            .command_line("eth0"),
            "tc filter delete dev eth0 parent 17:"
        );
    }

    #[test]
    fn conflict_recovery_targets_the_same_object() {
        let add = TcOp::AddClass(HtbClass {
            parent: Handle::new(17, 11),
            classid: Handle::new(17, 12),
            rate_kbit: 1,
            ceil_kbit: Some(2),
            burst: "32k",
        });
        assert_eq!(
            add.conflict_recovery(),
            Some(TcOp::DeleteClass {
                parent: Handle::new(17, 11),
                classid: Handle::new(17, 12),
            })
        );
        assert_eq!(TcOp::DeleteRootQdisc.conflict_recovery(), None);
        let filter = TcOp::AddFilter(PortFilter {
            parent: ROOT,
            prio: 1,
            port: PortMatch::Destination(32000),
            flowid: Handle::new(17, 12),
        });
        assert_eq!(filter.conflict_recovery(), None);
        assert!(TcOp::DeleteRootQdisc.is_delete());
        assert!(!add.is_delete());
    }
}

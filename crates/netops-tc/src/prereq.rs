use std::fmt;
use std::path::Path;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn interface_exists(sys_net: &Path, interface: &str) -> bool {
    sys_net.join(interface).exists()
}

/// Check prerequisites for the `tc` backend on `interface`.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_tc_prereqs(interface: &str) -> Vec<MissingPrereq> {
    check_tc_prereqs_in(Path::new("/sys/class/net"), interface)
}

fn check_tc_prereqs_in(sys_net: &Path, interface: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("tc") {
        missing.push(MissingPrereq {
            name: "tc".to_owned(),
            purpose: "traffic control configuration",
            install_hint: "part of iproute2: apt install iproute2 | dnf install iproute-tc | apk add iproute2-tc",
        });
    }

    if !interface_exists(sys_net, interface) {
        missing.push(MissingPrereq {
            name: format!("interface {interface}"),
            purpose: "network interface to shape",
            install_hint: "set NETWORK_INTERFACE to an interface listed by `ip link`",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-facing error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "tc".to_owned(),
            purpose: "traffic control configuration",
            install_hint: "apt install iproute2",
        }];
        let output = format_missing(&items);
        assert!(output.contains("tc"));
        assert!(output.contains("apt install iproute2"));
    }

    #[test]
    fn reports_unknown_interface() {
        let sys_net = Path::new("/nonexistent/netops-test/sys/class/net");
        let missing = check_tc_prereqs_in(sys_net, "eth7");
        assert!(missing.iter().any(|m| m.name == "interface eth7"));
    }
}

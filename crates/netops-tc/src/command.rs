//! Production backend: runs the iproute2 `tc` binary.

use crate::backend::{ShapingBackend, TcOutcome};
use crate::ops::TcOp;
use crate::TcError;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

const CONFLICT_MARKERS: &[&str] = &["File exists"];

const MISSING_MARKERS: &[&str] = &[
    "No such file or directory",
    "Cannot find specified qdisc",
    "Cannot delete qdisc with handle of zero",
];

/// Map a finished `tc` invocation onto a [`TcOutcome`].
///
/// `tc` only reports *why* it failed through its stderr text, so this is the
/// one place that inspects it.
pub fn classify(success: bool, stdout: &str, stderr: &str) -> TcOutcome {
    if success {
        return TcOutcome::Applied(stdout.trim().to_owned());
    }
    let detail = stderr.trim().to_owned();
    if CONFLICT_MARKERS.iter().any(|m| detail.contains(m)) {
        TcOutcome::Conflict(detail)
    } else if MISSING_MARKERS.iter().any(|m| detail.contains(m)) {
        TcOutcome::Missing(detail)
    } else if detail.is_empty() {
        TcOutcome::Failed("tc exited with non-zero status".to_owned())
    } else {
        TcOutcome::Failed(detail)
    }
}

pub struct TcCommandBackend {
    interface: String,
    program: PathBuf,
}

impl TcCommandBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            program: PathBuf::from("tc"),
        }
    }

    /// Use a specific `tc` binary instead of the one on `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, args: &[String]) -> Result<std::process::Output, TcError> {
        let output = Command::new(&self.program).args(args).output()?;
        Ok(output)
    }

    fn show_object(&self, object: &str) -> Result<String, TcError> {
        let args: Vec<String> = [object, "show", "dev", self.interface.as_str()]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(TcError::Failed {
                command: format!("tc {}", args.join(" ")),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ShapingBackend for TcCommandBackend {
    fn name(&self) -> &'static str {
        "tc"
    }

    fn interface(&self) -> &str {
        &self.interface
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("-V")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn apply(&self, op: &TcOp) -> TcOutcome {
        let args = op.args(&self.interface);
        debug!("running: tc {}", args.join(" "));
        let output = match self.run(&args) {
            Ok(o) => o,
            Err(e) => return TcOutcome::Failed(format!("failed to run tc: {e}")),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = classify(output.status.success(), &stdout, &stderr);
        if !outcome.is_applied() {
            debug!(
                "tc {} returned {:?}: {}",
                args.join(" "),
                output.status.code(),
                outcome.detail()
            );
        }
        outcome
    }

    fn show(&self) -> Result<String, TcError> {
        let mut out = String::new();
        for object in ["qdisc", "class", "filter"] {
            out.push_str(&self.show_object(object)?);
        }
        Ok(out)
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tiny_http::Server;
use tracing::info;

/// Install a SIGINT/SIGTERM handler that flags shutdown and wakes the
/// workers blocked on `server`. A second signal exits immediately.
pub fn install_signal_handler(
    shutdown: Arc<AtomicBool>,
    server: Arc<Server>,
) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        if request_shutdown(&shutdown, &server) {
            std::process::exit(1);
        }
        info!("shutdown requested, finishing in-flight requests");
    })
}

/// Flag shutdown and unblock one waiting worker; each exiting worker unblocks
/// the next. Returns whether shutdown had already been requested.
pub fn request_shutdown(shutdown: &AtomicBool, server: &Server) -> bool {
    let already = shutdown.swap(true, Ordering::SeqCst);
    server.unblock();
    already
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_reports_already_requested() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let flag = AtomicBool::new(false);
        assert!(!request_shutdown(&flag, &server));
        assert!(flag.load(Ordering::SeqCst));
        assert!(request_shutdown(&flag, &server));
    }

    #[test]
    fn unblocks_waiting_receiver() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let flag = AtomicBool::new(false);
        request_shutdown(&flag, &server);
        assert!(server.recv().is_err());
    }
}

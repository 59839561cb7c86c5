//! Operator notifier that writes to the log.

use crate::infrastructure::ports::OperatorNotifier;

/// Forwards operator messages to `tracing`, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl OperatorNotifier for TracingNotifier {
    fn info(&self, message: &str) {
        tracing::info!(target: "beacon_engine::operator", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "beacon_engine::operator", "{}", message);
    }
}

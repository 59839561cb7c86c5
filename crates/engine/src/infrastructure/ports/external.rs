//! Operator-facing notification port.

/// User-visible messages for whoever is running the world.
///
/// Log lines go to `tracing`; this is for messages a game master should
/// actually see, such as an import finishing or failing.
#[cfg_attr(test, mockall::automock)]
pub trait OperatorNotifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

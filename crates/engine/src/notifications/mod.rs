//! Change notifications.

mod dispatcher;

pub use dispatcher::{ChangeDispatcher, ChangeHandler, Subscription};

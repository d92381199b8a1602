//! Boundary traits for the side effects the client triggers in its host:
//! user-visible error notifications and navigation.

use tracing::{error, warn};

/// Route the user is sent to when the session cannot be recovered
pub const AUTH_ROUTE: &str = "/auth";

/// Title used for error notifications
pub const ERROR_TITLE: &str = "Error";

/// Presents errors to the user (toast, status line, stderr...)
pub trait Notifier: Send + Sync {
    fn error(&self, title: &str, description: &str);
}

/// Moves the host application to another route
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Default notifier, reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, title: &str, description: &str) {
        error!(title, description, "API error");
    }
}

/// Default navigator, only records the redirect
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, route: &str) {
        warn!(route, "Navigation requested");
    }
}

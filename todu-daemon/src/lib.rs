//! Background sync daemon: scheduler loop, backoff, status store, and
//! native service management (systemd user units, launchd agents).

pub mod backoff;
pub mod daily;
mod error;
pub mod log_rotation;
pub mod paths;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod status;

pub use backoff::{Backoff, MAX_BACKOFF};
pub use error::DaemonError;
pub use scheduler::{init_tracing, parse_interval, Daemon, DaemonConfig};
pub use service::{CommandRunner, ServiceDescriptor, ServiceManager, SystemCommandRunner};
pub use shutdown::{LoopState, Shutdown};
pub use status::{Status, StatusStore};

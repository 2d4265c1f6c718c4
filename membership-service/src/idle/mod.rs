//! Idle-timeout handling: warn after a quiet period, end the session if
//! the warning is ignored.

mod monitor;
mod terminator;
mod watcher;

pub use monitor::{ActivityKind, ExpiryCause, IdleEvent, IdleMonitor, IdleState};
pub use terminator::RevokeOnExpiry;
pub use watcher::{IdleHandle, IdleWatcher, SessionTerminator};

//! # fleetup-remote
//!
//! Remote command execution for fleetup: the [`RemoteRunner`] seam, the
//! OpenSSH transport, dry-run and mock runners, and [`RemoteSession`].

pub mod command;
mod error;
pub mod mock;
pub mod runner;
pub mod session;
pub mod ssh;

pub use command::{shell_escape, CommandOutput, RemoteCommand};
pub use error::RemoteError;
pub use mock::MockRunner;
pub use runner::{DryRunRunner, PlannedCommand, RemoteRunner};
pub use session::{shutdown_channel, RemoteSession, Shutdown, ShutdownHandle};
pub use ssh::{SshRunner, DEFAULT_COMMAND_TIMEOUT};

//! cmdbridge - expose a host command registry over a local socket
//!
//! External processes connect to a Unix domain socket and send MessagePack
//! requests to list the host's commands or run one of them by id. The host
//! plugs in its registry through the [`CommandRegistry`] trait.
//!
//! # Example
//!
//! ```rust,no_run
//! use cmdbridge::ipc::{Dispatcher, IpcServer};
//! use cmdbridge::{CommandEntry, Settings, StaticRegistry};
//!
//! fn main() -> cmdbridge::Result<()> {
//!     let settings = Settings::load("cmdbridge.toml")?;
//!
//!     let registry = StaticRegistry::new()
//!         .register(CommandEntry::new("app:save", "Save file", "save"), || true);
//!     let dispatcher = Dispatcher::new(registry);
//!
//!     let server = IpcServer::bind(settings.socket_path())?;
//!     smol::block_on(server.serve(&dispatcher));
//!     Ok(())
//! }
//! ```
//!
//! # Protocol
//!
//! Each message is a four-element MessagePack array, sent back-to-back with
//! no extra framing. See [`ipc`] for the layout. Malformed messages are
//! logged and dropped without a reply; failed commands get a normal response
//! carrying `["Command not found"]`.

mod error;
pub mod ipc;
mod registry;
mod settings;

pub use error::{Error, Result};
pub use ipc::{Dispatcher, IpcError, IpcServer};
pub use registry::{CommandEntry, CommandRegistry, StaticRegistry};
pub use settings::{DEFAULT_SOCKET_NAME, Settings, default_socket_path};

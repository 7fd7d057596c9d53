//! Inter-Process Communication (IPC) with the host command registry
//!
//! External processes connect to a Unix domain socket and exchange
//! MessagePack envelopes with the host:
//!
//! ```text
//! Request:  [0, id, "list_cmds", {includeNames: bool, includeIcons: bool}]
//!           [0, id, "run_cmd",   {cmdId: str}]
//! Response: [1, id, error: [str] | nil, result]
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use cmdbridge::ipc::{Dispatcher, IpcServer};
//! use cmdbridge::{CommandEntry, StaticRegistry};
//!
//! let registry = StaticRegistry::new()
//!     .register(CommandEntry::new("app:save", "Save file", "save"), || true);
//! let dispatcher = Dispatcher::new(registry);
//!
//! let server = IpcServer::bind("/tmp/cmdbridge.sock")?;
//! smol::block_on(server.serve(&dispatcher));
//! # Ok::<(), cmdbridge::Error>(())
//! ```

pub mod codec;
mod dispatch;
mod protocol;
mod server;
mod value;

pub use codec::{FrameDecoder, MessageStream};
pub use dispatch::Dispatcher;
pub use protocol::{
    COMMAND_NOT_FOUND, CommandDescriptor, Envelope, FnName, IpcError, MessageId, MessageKind,
    Request, Response, ResponseResult,
};
pub use server::IpcServer;
pub use value::Value;

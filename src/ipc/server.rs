//! IPC server implementation
//!
//! Unix domain socket server exposing the command registry to local processes.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_net::unix::{UnixListener, UnixStream};
use futures_lite::future;
use futures_lite::io::AsyncWriteExt;
use smol::{LocalExecutor, Timer};

use crate::error::Result;
use crate::ipc::codec::MessageStream;
use crate::ipc::dispatch::Dispatcher;
use crate::ipc::protocol::{Envelope, Request};
use crate::ipc::value::Value;
use crate::registry::CommandRegistry;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// IPC server that listens on a Unix domain socket
///
/// Binding acquires the socket path and dropping the server releases it:
/// the listener is closed and the socket file removed.
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind a new server at `socket_path`
    ///
    /// A file left behind at that path by an earlier unclean shutdown is
    /// removed first.
    pub fn bind(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        match std::fs::remove_file(&socket_path) {
            Ok(()) => tracing::debug!(path = %socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // Create parent directory if needed
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&socket_path)?;

        tracing::info!(path = %socket_path.display(), "IPC server listening");

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept and serve connections forever
    pub async fn serve<R: CommandRegistry>(&self, dispatcher: &Dispatcher<R>) {
        self.serve_until(dispatcher, future::pending()).await
    }

    /// Accept and serve connections until `shutdown` completes
    ///
    /// Connections run as tasks on a single-threaded executor. Connections
    /// still open at shutdown are dropped without draining.
    pub async fn serve_until<R, F>(&self, dispatcher: &Dispatcher<R>, shutdown: F)
    where
        R: CommandRegistry,
        F: Future<Output = ()>,
    {
        let executor = LocalExecutor::new();

        let accept_loop = async {
            let listener = &self.listener;
            let mut accept = move || listener.accept();
            loop {
                let (stream, _addr) = next_connection(&mut accept).await;
                tracing::debug!("accepted IPC connection");
                executor
                    .spawn(handle_connection(stream, dispatcher))
                    .detach();
            }
        };

        executor.run(future::or(accept_loop, shutdown)).await;
        tracing::debug!(path = %self.socket_path.display(), "IPC server stopping");
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Wait for the next accepted connection
///
/// Accept errors such as running out of file descriptors tend to repeat
/// immediately; each one is logged and followed by [`ACCEPT_BACKOFF`] so the
/// executor keeps running connection tasks and the shutdown future.
async fn next_connection<S, F, Fut>(accept: &mut F) -> S
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<S>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept IPC connection");
                Timer::after(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Handle a single connection
///
/// Messages are processed one at a time in arrival order; each valid request
/// gets its response written before the next message is decoded.
async fn handle_connection<R: CommandRegistry>(stream: UnixStream, dispatcher: &Dispatcher<R>) {
    let mut messages = MessageStream::new(stream.clone());
    let mut writer = stream;

    while let Some(next) = messages.next().await {
        let value = match next {
            Ok(value) => value,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "dropping undecodable message");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "closing IPC connection");
                break;
            }
        };

        let Some(response) = respond(dispatcher, value) else {
            continue;
        };

        if let Err(e) = writer.write_all(&response).await {
            tracing::warn!(error = %e, "failed to write response");
            break;
        }
    }

    // Peer finished sending; end our side once every response is out
    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "failed to close IPC connection");
    }
}

/// Run one decoded message through validation and dispatch
///
/// Returns the encoded response, or `None` when the message gets no reply.
fn respond<R: CommandRegistry>(dispatcher: &Dispatcher<R>, value: Value) -> Option<Vec<u8>> {
    let envelope = match Envelope::validate(value) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "dropping invalid message");
            return None;
        }
    };

    let id = envelope.id();
    let Some(request) = Request::parse(envelope) else {
        tracing::warn!(%id, "dropping non-request message");
        return None;
    };

    tracing::debug!(%id, function = request.function().as_str(), "handling IPC request");
    let response = dispatcher.handle(request);

    match response.to_bytes() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(%id, error = %e, "failed to encode response");
            None
        }
    }
}

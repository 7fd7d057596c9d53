//! CLI tool for sending requests to a cmdbridge socket
//!
//! Usage:
//!   cmdbridge-ipc list --names --icons
//!   cmdbridge-ipc run app:save
//!   cmdbridge-ipc --socket /tmp/other.sock run app:save

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cmdbridge::ipc::{Envelope, FrameDecoder, MessageId, Request, Value};

/// CLI tool for sending requests to a cmdbridge socket
#[derive(Parser)]
#[command(name = "cmdbridge-ipc")]
#[command(about = "Send requests to a cmdbridge server")]
struct Cli {
    /// Socket path of the server
    #[arg(long, env = "CMDBRIDGE_SOCKET", default_value_os_t = cmdbridge::default_socket_path())]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the host's commands
    List {
        /// Include command names
        #[arg(long)]
        names: bool,

        /// Include command icons
        #[arg(long)]
        icons: bool,
    },

    /// Run a command by id
    Run {
        /// Command id, e.g. app:save
        id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let id = MessageId::from(rand::random::<u32>());
    let request = match cli.command {
        Command::List { names, icons } => Request::ListCommands {
            id,
            include_names: names,
            include_icons: icons,
        },
        Command::Run { id: cmd_id } => Request::RunCommand {
            id,
            command_id: Some(cmd_id),
        },
    };

    match send_request(&cli.socket, &request) {
        Ok(Envelope::Response {
            error: None, result, ..
        }) => match serde_json::to_string_pretty(&to_json(result)) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: JSON encoding failed: {e}");
                ExitCode::FAILURE
            }
        },
        Ok(Envelope::Response {
            error: Some(errors),
            ..
        }) => {
            for error in errors {
                eprintln!("error: {error}");
            }
            ExitCode::FAILURE
        }
        Ok(Envelope::Request { .. }) => {
            eprintln!("error: server replied with a request");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn send_request(socket_path: &Path, request: &Request) -> Result<Envelope, String> {
    let mut stream = UnixStream::connect(socket_path)
        .map_err(|e| format!("failed to connect to {}: {e}", socket_path.display()))?;

    let bytes = request
        .to_bytes()
        .map_err(|e| format!("failed to encode request: {e}"))?;
    stream
        .write_all(&bytes)
        .map_err(|e| format!("failed to send request: {e}"))?;
    // One request per connection; let the server finish and close
    stream
        .shutdown(std::net::Shutdown::Write)
        .map_err(|e| format!("failed to send request: {e}"))?;

    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 8192];
    loop {
        if let Some(value) = decoder
            .next_value()
            .map_err(|e| format!("failed to decode response: {e}"))?
        {
            let envelope =
                Envelope::validate(value).map_err(|e| format!("invalid response: {e}"))?;
            if envelope.id() != request.id() {
                return Err(format!(
                    "response id {} does not match request id {}",
                    envelope.id(),
                    request.id()
                ));
            }
            return Ok(envelope);
        }

        let n = stream
            .read(&mut chunk)
            .map_err(|e| format!("failed to read response: {e}"))?;
        if n == 0 {
            return Err("connection closed without a response".to_string());
        }
        decoder.extend(&chunk[..n]);
    }
}

/// Render a MessagePack value as JSON for display
fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => b.into(),
        Value::Int(n) => n.into(),
        Value::UInt(n) => n.into(),
        Value::Float(n) => n.into(),
        Value::String(s) => s.into(),
        Value::Binary(bytes) => bytes.into(),
        Value::Array(items) => items.into_iter().map(to_json).collect(),
        Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Value::String(s) => s,
                    other => to_json(other).to_string(),
                };
                (key, to_json(v))
            })
            .collect::<serde_json::Map<_, _>>()
            .into(),
    }
}

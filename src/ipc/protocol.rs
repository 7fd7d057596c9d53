//! Wire protocol types for IPC
//!
//! Every message is a MessagePack array of four elements:
//! ```text
//! Request:  [0, id, fn_name: str, params: map]
//! Response: [1, id, error: [str] | nil, result: any]
//! ```
//!
//! Messages are sent back-to-back on the socket without any length prefix;
//! MessagePack objects are self-delimiting.

use std::fmt;
use std::io;

use serde::ser::{Serialize, SerializeTuple, Serializer};
use thiserror::Error;

use crate::ipc::codec;
use crate::ipc::value::Value;

/// Error message returned when `run_cmd` fails
pub const COMMAND_NOT_FOUND: &str = "Command not found";

/// Errors that can occur during IPC operations
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid MessagePack data: {0}")]
    InvalidMessagePack(String),

    #[error("unsupported MessagePack value: {0}")]
    UnsupportedValue(rmp_serde::decode::Error),

    #[error("pending message exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("stream ended with {0} bytes of an incomplete message")]
    Truncated(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IpcError {
    /// Whether the byte stream is still usable after this error
    ///
    /// Validation failures only affect a single message. Decoding failures
    /// that lose track of message boundaries, and transport errors, do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IpcError::MalformedEnvelope(_)
                | IpcError::UnknownMessageKind(_)
                | IpcError::UnknownFunction(_)
                | IpcError::UnsupportedValue(_)
                | IpcError::Serialization(_)
        )
    }
}

/// Envelope discriminator, element 0 of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0,
    Response = 1,
}

impl MessageKind {
    fn from_value(value: &Value) -> Option<Self> {
        let tag = match *value {
            Value::UInt(n) => n,
            Value::Float(n) if n == 0.0 => 0,
            Value::Float(n) if n == 1.0 => 1,
            _ => return None,
        };
        match tag {
            0 => Some(MessageKind::Request),
            1 => Some(MessageKind::Response),
            _ => None,
        }
    }
}

/// Correlation id chosen by the requester
///
/// Echoed back exactly as received, including its numeric representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageId {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl MessageId {
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Int(n) => Some(MessageId::Signed(n)),
            Value::UInt(n) => Some(MessageId::Unsigned(n)),
            Value::Float(n) => Some(MessageId::Float(n)),
            _ => None,
        }
    }
}

impl From<u32> for MessageId {
    fn from(n: u32) -> Self {
        MessageId::Unsigned(u64::from(n))
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        MessageId::Unsigned(n)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Signed(n) => write!(f, "{n}"),
            MessageId::Unsigned(n) => write!(f, "{n}"),
            MessageId::Float(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            MessageId::Signed(n) => serializer.serialize_i64(n),
            MessageId::Unsigned(n) => serializer.serialize_u64(n),
            MessageId::Float(n) => serializer.serialize_f64(n),
        }
    }
}

/// Functions a request may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnName {
    ListCommands,
    RunCommand,
}

impl FnName {
    pub const ALL: [FnName; 2] = [FnName::ListCommands, FnName::RunCommand];

    /// Name used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            FnName::ListCommands => "list_cmds",
            FnName::RunCommand => "run_cmd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

/// A validated message envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request {
        id: MessageId,
        function: FnName,
        params: Value,
    },
    Response {
        id: MessageId,
        error: Option<Vec<String>>,
        result: Value,
    },
}

impl Envelope {
    /// Classify a decoded value as a request or response envelope
    ///
    /// Checks run in order and stop at the first failure: shape, numeric
    /// kind and id, known kind, then the kind-specific third element.
    pub fn validate(value: Value) -> Result<Self, IpcError> {
        let elements = match value {
            Value::Array(elements) => elements,
            other => {
                return Err(IpcError::MalformedEnvelope(format!(
                    "expected an array, got {}",
                    type_name(&other)
                )));
            }
        };

        let [raw_kind, raw_id, a, b]: [Value; 4] = elements.try_into().map_err(|e: Vec<Value>| {
            IpcError::MalformedEnvelope(format!("expected 4 elements, got {}", e.len()))
        })?;

        if !raw_kind.is_number() || !raw_id.is_number() {
            return Err(IpcError::MalformedEnvelope(
                "kind and id must be numeric".to_string(),
            ));
        }

        let kind = MessageKind::from_value(&raw_kind)
            .ok_or_else(|| IpcError::UnknownMessageKind(format!("{raw_kind:?}")))?;
        let id = MessageId::from_value(&raw_id)
            .ok_or_else(|| IpcError::MalformedEnvelope("id must be numeric".to_string()))?;

        match kind {
            MessageKind::Request => {
                let function = a
                    .as_str()
                    .and_then(FnName::from_name)
                    .ok_or_else(|| IpcError::UnknownFunction(describe_function(&a)))?;
                Ok(Envelope::Request {
                    id,
                    function,
                    params: b,
                })
            }
            MessageKind::Response => {
                let error = match a {
                    Value::Nil => None,
                    Value::Array(items) => Some(
                        items
                            .into_iter()
                            .map(|item| match item {
                                Value::String(s) => Ok(s),
                                other => Err(IpcError::MalformedEnvelope(format!(
                                    "error entries must be strings, got {}",
                                    type_name(&other)
                                ))),
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    other => {
                        return Err(IpcError::MalformedEnvelope(format!(
                            "error must be nil or an array, got {}",
                            type_name(&other)
                        )));
                    }
                };
                Ok(Envelope::Response {
                    id,
                    error,
                    result: b,
                })
            }
        }
    }

    pub fn id(&self) -> MessageId {
        match self {
            Envelope::Request { id, .. } | Envelope::Response { id, .. } => *id,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Bool(_) => "bool",
        Value::Int(_) | Value::UInt(_) => "integer",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
    }
}

fn describe_function(value: &Value) -> String {
    match value.as_str() {
        Some(name) => name.to_string(),
        None => format!("<{}>", type_name(value)),
    }
}

/// A typed request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListCommands {
        id: MessageId,
        include_names: bool,
        include_icons: bool,
    },
    RunCommand {
        id: MessageId,
        /// `None` when the caller sent no string `cmdId`
        command_id: Option<String>,
    },
}

impl Request {
    /// Map a validated request envelope onto its typed variant
    ///
    /// Returns `None` for response envelopes. Params are only read, never
    /// validated: missing projection flags mean "omit", a missing command id
    /// is left for the handler to reject.
    pub fn parse(envelope: Envelope) -> Option<Self> {
        let Envelope::Request {
            id,
            function,
            params,
        } = envelope
        else {
            return None;
        };

        let request = match function {
            FnName::ListCommands => Request::ListCommands {
                id,
                include_names: flag(&params, "includeNames"),
                include_icons: flag(&params, "includeIcons"),
            },
            FnName::RunCommand => Request::RunCommand {
                id,
                command_id: params
                    .get("cmdId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        };
        Some(request)
    }

    pub fn id(&self) -> MessageId {
        match self {
            Request::ListCommands { id, .. } | Request::RunCommand { id, .. } => *id,
        }
    }

    pub fn function(&self) -> FnName {
        match self {
            Request::ListCommands { .. } => FnName::ListCommands,
            Request::RunCommand { .. } => FnName::RunCommand,
        }
    }

    /// Encode as a wire envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>, IpcError> {
        codec::encode(self)
    }

    fn params(&self) -> Value {
        match self {
            Request::ListCommands {
                include_names,
                include_icons,
                ..
            } => Value::map([
                ("includeNames", Value::Bool(*include_names)),
                ("includeIcons", Value::Bool(*include_icons)),
            ]),
            Request::RunCommand { command_id, .. } => match command_id {
                Some(cmd_id) => Value::map([("cmdId", Value::from(cmd_id.as_str()))]),
                None => Value::Map(Vec::new()),
            },
        }
    }
}

fn flag(params: &Value, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&(MessageKind::Request as u8))?;
        tuple.serialize_element(&self.id())?;
        tuple.serialize_element(self.function().as_str())?;
        tuple.serialize_element(&self.params())?;
        tuple.end()
    }
}

/// Projection of a registry command returned by `list_cmds`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Result payload of a response
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum ResponseResult {
    Commands(Vec<CommandDescriptor>),
    Executed(bool),
}

/// Response to a single request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: MessageId,
    /// `None` means success
    pub error: Option<Vec<String>>,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(id: MessageId, result: ResponseResult) -> Self {
        Self {
            id,
            error: None,
            result,
        }
    }

    pub fn failure(id: MessageId, message: impl Into<String>, result: ResponseResult) -> Self {
        Self {
            id,
            error: Some(vec![message.into()]),
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Encode as a wire envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>, IpcError> {
        codec::encode(self)
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&(MessageKind::Response as u8))?;
        tuple.serialize_element(&self.id)?;
        tuple.serialize_element(&self.error)?;
        tuple.serialize_element(&self.result)?;
        tuple.end()
    }
}

//! MessagePack stream codec
//!
//! Messages arrive back-to-back on one byte stream with no outer framing.
//! [`FrameDecoder`] buffers bytes until a complete MessagePack object is
//! available, so a message split across reads (or several messages in one
//! read) decode the same way.

use futures_lite::io::{AsyncRead, AsyncReadExt};
use rmp::Marker;
use serde::Serialize;

use crate::ipc::protocol::IpcError;
use crate::ipc::value::Value;

/// Largest incomplete message we are willing to buffer (16MB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Deepest array/map nesting accepted while scanning
const MAX_DEPTH: usize = 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Serialize a value to MessagePack, structs as maps with field names
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, IpcError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a single complete MessagePack object
pub fn decode(bytes: &[u8]) -> Result<Value, IpcError> {
    rmp_serde::from_slice(bytes).map_err(IpcError::UnsupportedValue)
}

/// Incremental decoder for a stream of concatenated MessagePack objects
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    scanner: FrameScanner,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop buffered bytes, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let len = self.buf.len();
        self.buf.clear();
        self.scanner = FrameScanner::default();
        len
    }

    /// Take the next complete object from the buffer
    ///
    /// Returns `Ok(None)` when more bytes are needed. A complete object that
    /// has no [`Value`] representation is consumed and reported as
    /// [`IpcError::UnsupportedValue`]; bytes that are not MessagePack at all
    /// are reported as [`IpcError::InvalidMessagePack`].
    pub fn next_value(&mut self) -> Result<Option<Value>, IpcError> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let Some(frame_len) = self.scanner.resume(&self.buf)? else {
            if self.buf.len() > MAX_FRAME_LEN {
                return Err(IpcError::FrameTooLarge {
                    limit: MAX_FRAME_LEN,
                });
            }
            return Ok(None);
        };

        let frame: Vec<u8> = self.buf.drain(..frame_len).collect();
        decode(&frame).map(Some)
    }
}

/// Resumable walk over the object at the front of the buffer
///
/// Keeps the scan offset and the number of items each open array or map
/// still owes, so every byte is examined once however many reads the
/// object arrives in.
#[derive(Debug)]
struct FrameScanner {
    offset: usize,
    owed: Vec<u64>,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self {
            offset: 0,
            owed: vec![1],
        }
    }
}

impl FrameScanner {
    /// Length of the front object once `buf` holds all of it
    fn resume(&mut self, buf: &[u8]) -> Result<Option<usize>, IpcError> {
        while let Some(owed) = self.owed.last_mut() {
            if *owed == 0 {
                self.owed.pop();
                continue;
            }

            let Some(item) = scan_item(&buf[self.offset..], self.offset)? else {
                return Ok(None);
            };
            *owed -= 1;
            self.offset += item.len;

            if item.children > 0 {
                if self.owed.len() >= MAX_DEPTH {
                    return Err(IpcError::InvalidMessagePack(format!(
                        "nesting deeper than {MAX_DEPTH} at offset {}",
                        self.offset
                    )));
                }
                self.owed.push(item.children);
            }
        }

        let len = self.offset;
        *self = Self::default();
        Ok(Some(len))
    }
}

/// One item's own bytes (header and scalar payload) and its child count
struct ScannedItem {
    len: usize,
    children: u64,
}

enum Body {
    /// Fixed payload size
    Payload(u64),
    /// Payload size from the length field, plus extra bytes
    Sized(u64),
    /// Fixed child count
    Children(u64),
    /// Child count from the length field, times entries per item
    Counted(u64),
}

/// Scan the item starting at `bytes`, or `None` if it is not fully buffered
fn scan_item(bytes: &[u8], offset: usize) -> Result<Option<ScannedItem>, IpcError> {
    let Some(&first) = bytes.first() else {
        return Ok(None);
    };

    // (width of the length field, body)
    let (width, body) = match Marker::from_u8(first) {
        Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
            (0, Body::Payload(0))
        }
        Marker::U8 | Marker::I8 => (0, Body::Payload(1)),
        Marker::U16 | Marker::I16 => (0, Body::Payload(2)),
        Marker::U32 | Marker::I32 | Marker::F32 => (0, Body::Payload(4)),
        Marker::U64 | Marker::I64 | Marker::F64 => (0, Body::Payload(8)),
        Marker::FixExt1 => (0, Body::Payload(2)),
        Marker::FixExt2 => (0, Body::Payload(3)),
        Marker::FixExt4 => (0, Body::Payload(5)),
        Marker::FixExt8 => (0, Body::Payload(9)),
        Marker::FixExt16 => (0, Body::Payload(17)),
        Marker::FixStr(n) => (0, Body::Payload(u64::from(n))),
        Marker::FixArray(n) => (0, Body::Children(u64::from(n))),
        Marker::FixMap(n) => (0, Body::Children(2 * u64::from(n))),
        Marker::Str8 | Marker::Bin8 => (1, Body::Sized(0)),
        Marker::Str16 | Marker::Bin16 => (2, Body::Sized(0)),
        Marker::Str32 | Marker::Bin32 => (4, Body::Sized(0)),
        // ext payloads carry a type byte after the length
        Marker::Ext8 => (1, Body::Sized(1)),
        Marker::Ext16 => (2, Body::Sized(1)),
        Marker::Ext32 => (4, Body::Sized(1)),
        Marker::Array16 => (2, Body::Counted(1)),
        Marker::Array32 => (4, Body::Counted(1)),
        Marker::Map16 => (2, Body::Counted(2)),
        Marker::Map32 => (4, Body::Counted(2)),
        Marker::Reserved => {
            return Err(IpcError::InvalidMessagePack(format!(
                "reserved marker 0x{first:02x} at offset {offset}"
            )));
        }
    };

    let Some(field) = bytes.get(1..1 + width) else {
        return Ok(None);
    };
    let field_value = field.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    let header = 1 + width as u64;

    let (payload, children) = match body {
        Body::Payload(n) => (n, 0),
        Body::Sized(extra) => (field_value + extra, 0),
        Body::Children(n) => (0, n),
        Body::Counted(per_item) => (0, field_value * per_item),
    };

    // Scalars are only stepped over once their payload is buffered
    let len = header + payload;
    if (bytes.len() as u64) < len {
        return Ok(None);
    }

    Ok(Some(ScannedItem {
        len: len as usize,
        children,
    }))
}

/// Lazy sequence of values decoded from an async byte stream
///
/// Ends when the reader reaches end of input and every complete buffered
/// object has been yielded.
pub struct MessageStream<R> {
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> MessageStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            chunk: vec![0u8; READ_CHUNK],
            finished: false,
        }
    }

    /// Next decoded value, or `None` once the stream is exhausted
    ///
    /// After an error that is not [recoverable](IpcError::is_recoverable) the
    /// stream yields `None`.
    pub async fn next(&mut self) -> Option<Result<Value, IpcError>> {
        loop {
            match self.decoder.next_value() {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {}
                Err(e) => {
                    if !e.is_recoverable() {
                        self.fail();
                    }
                    return Some(Err(e));
                }
            }

            if self.finished {
                if self.decoder.is_empty() {
                    return None;
                }
                return Some(Err(IpcError::Truncated(self.decoder.clear())));
            }

            match self.reader.read(&mut self.chunk).await {
                Ok(0) => self.finished = true,
                Ok(n) => self.decoder.extend(&self.chunk[..n]),
                Err(e) => {
                    self.fail();
                    return Some(Err(IpcError::Io(e)));
                }
            }
        }
    }

    fn fail(&mut self) {
        self.finished = true;
        self.decoder.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::{MessageId, Request};

    fn run_cmd(id: u64, cmd: &str) -> Vec<u8> {
        Request::RunCommand {
            id: MessageId::Unsigned(id),
            command_id: Some(cmd.to_string()),
        }
        .to_bytes()
        .unwrap()
    }

    fn drain(decoder: &mut FrameDecoder) -> Vec<Value> {
        let mut values = Vec::new();
        while let Some(value) = decoder.next_value().unwrap() {
            values.push(value);
        }
        values
    }

    #[test]
    fn test_back_to_back_messages() {
        let mut bytes = run_cmd(1, "a");
        bytes.extend(run_cmd(2, "b"));
        bytes.extend(encode(&Value::Nil).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        let values = drain(&mut decoder);

        assert_eq!(values.len(), 3);
        assert_eq!(values[0], decode(&run_cmd(1, "a")).unwrap());
        assert_eq!(values[1], decode(&run_cmd(2, "b")).unwrap());
        assert_eq!(values[2], Value::Nil);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_resumes_across_partial_reads() {
        let mut bytes = run_cmd(41, "app:save");
        bytes.extend(run_cmd(42, "app:quit"));

        let mut decoder = FrameDecoder::new();
        let mut values = Vec::new();
        for byte in &bytes {
            decoder.extend(std::slice::from_ref(byte));
            values.extend(drain(&mut decoder));
        }

        assert_eq!(values.len(), 2);
        assert_eq!(values[1], decode(&run_cmd(42, "app:quit")).unwrap());
    }

    #[test]
    fn test_unsupported_value_is_skipped() {
        // fixext1 followed by a valid nil
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0xd4, 0x01, 0x00, 0xc0]);

        let err = decoder.next_value().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(decoder.next_value().unwrap(), Some(Value::Nil));
    }

    #[test]
    fn test_invalid_marker_is_fatal() {
        // 0xc1 is never used by MessagePack
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0xc1, 0x00]);

        let err = decoder.next_value().unwrap_err();
        assert!(matches!(err, IpcError::InvalidMessagePack(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_oversized_pending_frame() {
        // array32 announcing more elements than ever arrive
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0xdd, 0x7f, 0xff, 0xff, 0xff]);
        decoder.extend(&vec![0xc0; MAX_FRAME_LEN]);

        assert!(matches!(
            decoder.next_value(),
            Err(IpcError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_trickled_object_is_scanned_once() {
        let count: u32 = 262_144;
        let mut bytes = vec![0xdd];
        bytes.extend(count.to_be_bytes());
        bytes.extend(vec![0xc0; count as usize]);

        let mut decoder = FrameDecoder::new();
        let mut values = Vec::new();
        for chunk in bytes.chunks(64) {
            decoder.extend(chunk);
            match decoder.next_value().unwrap() {
                Some(value) => values.push(value),
                // Nothing before the scan offset is looked at again
                None => assert_eq!(decoder.scanner.offset, decoder.buf.len()),
            }
        }

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_array().map(<[Value]>::len), Some(count as usize));
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_nesting_limit() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&vec![0x91; MAX_DEPTH + 1]);

        assert!(matches!(
            decoder.next_value(),
            Err(IpcError::InvalidMessagePack(_))
        ));
    }

    #[test]
    fn test_scanner_resets_between_objects() {
        let mut decoder = FrameDecoder::new();
        // {"a": [1, 2]} split inside the nested array, then a second object
        let first = encode(&Value::map([("a", Value::from(vec![1u64, 2]))])).unwrap();
        let (head, tail) = first.split_at(first.len() - 1);
        decoder.extend(head);
        assert_eq!(decoder.next_value().unwrap(), None);

        decoder.extend(tail);
        decoder.extend(&[0x2a]);
        assert_eq!(decoder.next_value().unwrap(), Some(decode(&first).unwrap()));
        assert_eq!(decoder.next_value().unwrap(), Some(Value::UInt(42)));
        assert_eq!(decoder.next_value().unwrap(), None);
    }

    #[test]
    fn test_stream_yields_values_then_reports_truncation() {
        let mut bytes = run_cmd(1, "a");
        let second = run_cmd(2, "b");
        bytes.extend(&second[..second.len() - 1]);

        smol::block_on(async {
            let mut stream = MessageStream::new(&bytes[..]);
            assert!(matches!(stream.next().await, Some(Ok(_))));
            assert!(matches!(
                stream.next().await,
                Some(Err(IpcError::Truncated(n))) if n == second.len() - 1
            ));
            assert!(stream.next().await.is_none());
        });
    }

    #[test]
    fn test_stream_stops_after_fatal_error() {
        let mut bytes = run_cmd(1, "a");
        bytes.push(0xc1);
        bytes.extend(run_cmd(2, "b"));

        smol::block_on(async {
            let mut stream = MessageStream::new(&bytes[..]);
            assert!(matches!(stream.next().await, Some(Ok(_))));
            assert!(matches!(
                stream.next().await,
                Some(Err(IpcError::InvalidMessagePack(_)))
            ));
            assert!(stream.next().await.is_none());
        });
    }
}

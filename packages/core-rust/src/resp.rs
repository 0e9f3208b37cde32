//! RESP wire codec: encoding replies and decoding/framing incoming requests.
//!
//! The framer itself (turning a raw byte stream into discrete frames) is a
//! server-layer concern; this module assumes a complete frame is already in
//! hand and turns it into a tokenized argument vector, or the reverse.

use bytes::{Bytes, BytesMut};

use crate::command::ReplyValue;

/// Encodes a [`ReplyValue`] into its RESP wire form.
#[must_use]
pub fn encode_reply(reply: &ReplyValue) -> Bytes {
    let mut buf = BytesMut::new();
    encode_into(reply, &mut buf);
    buf.freeze()
}

fn encode_into(reply: &ReplyValue, buf: &mut BytesMut) {
    match reply {
        ReplyValue::Simple(s) => {
            buf.extend_from_slice(b"+");
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ReplyValue::Error(msg) => {
            buf.extend_from_slice(b"-");
            buf.extend_from_slice(msg.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ReplyValue::Integer(n) => {
            buf.extend_from_slice(b":");
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ReplyValue::Bulk(data) => {
            buf.extend_from_slice(b"$");
            buf.extend_from_slice(data.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(data);
            buf.extend_from_slice(b"\r\n");
        }
        ReplyValue::NullBulk => buf.extend_from_slice(b"$-1\r\n"),
        ReplyValue::NullArray => buf.extend_from_slice(b"*-1\r\n"),
        ReplyValue::Array(items) => {
            buf.extend_from_slice(b"*");
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                encode_into(item, buf);
            }
        }
    }
}

/// Re-encodes an already-tokenized command back into a RESP array, for
/// journaling to the append log and for replication, regardless of whether
/// the client originally sent it inline or as an array.
#[must_use]
pub fn encode_command(args: &[Bytes]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        buf.extend_from_slice(b"$");
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf.freeze()
}

/// Error produced while tokenizing a frame that claims to be a RESP array
/// but is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("protocol error: invalid multibulk length")]
    InvalidMultibulkLength,
    #[error("protocol error: invalid bulk length")]
    InvalidBulkLength,
    #[error("protocol error: expected '$', got something else")]
    ExpectedBulkString,
    #[error("protocol error: unbalanced quotes in request")]
    Malformed,
}

/// Tokenizes one complete, already-delimited frame into a command's
/// argument vector.
///
/// A frame starting with `*` is parsed as a RESP array of bulk strings; any
/// other frame is treated as an inline command, whitespace-tokenized on a
/// single line, matching the reference protocol's support for both styles.
pub fn tokenize_frame(frame: &[u8]) -> Result<Vec<Bytes>, FrameError> {
    if frame.first() == Some(&b'*') {
        tokenize_array(frame)
    } else {
        Ok(tokenize_inline(frame))
    }
}

fn tokenize_inline(frame: &[u8]) -> Vec<Bytes> {
    frame
        .split(|&b| b == b' ' || b == b'\t')
        .filter(|part| !part.is_empty())
        .map(|part| Bytes::copy_from_slice(part.strip_suffix(b"\r").unwrap_or(part)))
        .collect()
}

fn tokenize_array(frame: &[u8]) -> Result<Vec<Bytes>, FrameError> {
    let mut lines = frame.split(|&b| b == b'\n').map(|l| l.strip_suffix(b"\r").unwrap_or(l));

    let header = lines.next().ok_or(FrameError::InvalidMultibulkLength)?;
    let count_str = header.strip_prefix(b"*").ok_or(FrameError::InvalidMultibulkLength)?;
    let count: i64 = std::str::from_utf8(count_str)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(FrameError::InvalidMultibulkLength)?;
    if count < 0 {
        return Ok(Vec::new());
    }

    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len_line = lines.next().ok_or(FrameError::InvalidBulkLength)?;
        let len_str = len_line.strip_prefix(b"$").ok_or(FrameError::ExpectedBulkString)?;
        let len: usize = std::str::from_utf8(len_str)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(FrameError::InvalidBulkLength)?;
        let data_line = lines.next().ok_or(FrameError::Malformed)?;
        if data_line.len() != len {
            return Err(FrameError::Malformed);
        }
        args.push(Bytes::copy_from_slice(data_line));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple_and_error() {
        assert_eq!(encode_reply(&ReplyValue::Simple("OK".into())), Bytes::from_static(b"+OK\r\n"));
        assert_eq!(
            encode_reply(&ReplyValue::Error("ERR boom".into())),
            Bytes::from_static(b"-ERR boom\r\n")
        );
    }

    #[test]
    fn encode_bulk_and_null_bulk() {
        assert_eq!(
            encode_reply(&ReplyValue::Bulk(Bytes::from_static(b"bar"))),
            Bytes::from_static(b"$3\r\nbar\r\n")
        );
        assert_eq!(encode_reply(&ReplyValue::NullBulk), Bytes::from_static(b"$-1\r\n"));
    }

    #[test]
    fn encode_array_nested() {
        let reply = ReplyValue::Array(vec![ReplyValue::Integer(1), ReplyValue::Integer(2)]);
        assert_eq!(encode_reply(&reply), Bytes::from_static(b"*2\r\n:1\r\n:2\r\n"));
    }

    #[test]
    fn tokenize_array_frame() {
        let frame = b"*1\r\n$4\r\nPING\r\n";
        let args = tokenize_frame(frame).unwrap();
        assert_eq!(args, vec![Bytes::from_static(b"PING")]);
    }

    #[test]
    fn tokenize_inline_frame() {
        let args = tokenize_frame(b"SET foo bar\r\n").unwrap();
        assert_eq!(args, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"foo"), Bytes::from_static(b"bar")]);
    }

    #[test]
    fn tokenize_array_mismatched_length_errors() {
        let frame = b"*1\r\n$5\r\nPING\r\n";
        assert_eq!(tokenize_array(frame), Err(FrameError::Malformed));
    }

    #[test]
    fn roundtrip_command_encoding() {
        let args = vec![Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")];
        let encoded = encode_command(&args);
        let decoded = tokenize_frame(&encoded).unwrap();
        assert_eq!(decoded, args);
    }
}

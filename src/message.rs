//! Wire protocol
//!
//! Plaintext, no length prefixes and no terminators: every payload is
//! whatever a single send carries. The server only ever produces the
//! registration prompt, join/leave notices, and prefixed chat lines.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::Username;

/// Sent to every new connection before its username is read
pub const PROMPT: &[u8] = b"username: ";

/// Separator between the sender's username and the message body
pub const CHAT_SEPARATOR: &[u8] = b": ";

/// `` `<username>` joined the chat ``
pub fn joined(username: &Username) -> Bytes {
    notice(username, b" joined the chat")
}

/// `` `<username>` left the chat ``
pub fn left(username: &Username) -> Bytes {
    notice(username, b" left the chat")
}

/// `<username>: ` written into a fresh buffer with room for `capacity` bytes
///
/// The relay loop reads message bodies straight after this prefix.
pub fn chat_prefix(username: &Username, capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_slice(username.as_bytes());
    buf.put_slice(CHAT_SEPARATOR);
    buf
}

/// `<username>: <body>`
pub fn chat(username: &Username, body: &[u8]) -> Bytes {
    let mut buf = chat_prefix(username, username.len() + CHAT_SEPARATOR.len() + body.len());
    buf.put_slice(body);
    buf.freeze()
}

fn notice(username: &Username, tail: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(username.len() + tail.len() + 2);
    buf.put_u8(b'`');
    buf.put_slice(username.as_bytes());
    buf.put_u8(b'`');
    buf.put_slice(tail);
    buf.freeze()
}

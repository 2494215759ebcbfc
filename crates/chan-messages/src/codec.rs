//! Message encoding and decoding for the transport.
//!
//! # Wire Format
//!
//! One JSON object per message, discriminated by its `type` field. Binary
//! fields (keys, signatures, block data) are lowercase hex strings.

use thiserror::Error;

use crate::message::Message;

/// Messages larger than this are rejected before parsing.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message is empty")]
    Empty,

    #[error("Message of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Encode a message to wire bytes.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))?;
    if bytes.len() > MAX_MESSAGE_BYTES {
        return Err(CodecError::TooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }
    Ok(bytes)
}

/// Decode wire bytes into a message.
pub fn decode_message(data: &[u8]) -> Result<Message, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Empty);
    }
    if data.len() > MAX_MESSAGE_BYTES {
        return Err(CodecError::TooLarge {
            size: data.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }
    serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
}

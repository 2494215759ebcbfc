//! # chan-messages — Channel Records and Wire Messages
//!
//! - [`block`]: `SignedBlock`, the unit of state replication. The author
//!   signs the canonical encoding of header and body; peers confirm it by
//!   signing the same encoding.
//! - [`join`]: `SignedJoinChannel`, a time-bounded commitment to join a
//!   channel, co-signed by every active participant before the channel is
//!   opened on-chain.
//! - [`message`]: the closed set of messages peers exchange.
//! - [`codec`]: total encode/decode over that set.

pub mod block;
pub mod codec;
pub mod join;
pub mod message;

pub use block::{Block, BlockBody, BlockHeader, SignedBlock};
pub use codec::{decode_message, encode_message, CodecError, MAX_MESSAGE_BYTES};
pub use join::{JoinChannel, SignedJoinChannel};
pub use message::Message;

//! One module per message family. Each handler takes the shared context
//! and the decoded payload and returns the resulting flag (or reply).

pub mod block;
pub mod discovery;
pub mod join;

pub use block::{on_block_confirmation, on_signed_block};
pub use discovery::{on_can_join_leader_request, request_leader};
pub use join::on_join_channel_request;

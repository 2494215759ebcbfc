//! # chan-rpc — Peer Message Handling
//!
//! Sits between the transport and the [`StateManager`](chan_state::StateManager).
//! Every inbound [`Message`](chan_messages::Message) is routed to one
//! handler, which follows the same pattern:
//!
//! decode → authenticate → delegate → act on the flag
//!
//! - `SUCCESS`: re-broadcast the accepted artifact so every honest peer
//!   converges on the same history.
//! - `DISCONNECT`: sever the sending peer. Nothing is broadcast.
//! - `DISPUTE`: sever the peer and submit the assembled proof to the
//!   arbitrator.
//! - anything else: drop silently.
//!
//! ## Crate Policy
//!
//! - No channel state lives here; handlers hold only per-message
//!   bookkeeping (the join quorum).
//! - One [`RpcContext`] per node, built at startup and shared by
//!   reference. No globals.
//! - The [`Transport`] trait is the only network seam.
//!   [`LoopbackNetwork`] implements it in-process.

pub mod config;
pub mod context;
pub mod error;
pub mod escalation;
pub mod handlers;
pub mod loopback;
pub mod node;
pub mod router;
pub mod transport;

pub use config::{ConfigError, NodeConfig};
pub use context::RpcContext;
pub use error::RpcError;
pub use loopback::{Envelope, LoopbackNetwork, LoopbackTransport};
pub use node::ChannelNode;
pub use router::{dispatch, Routed};
pub use transport::Transport;

//! # chan-cli — Channel Node Command-Line Interface
//!
//! ## Subcommands
//!
//! - `keygen` — generate a participant key file
//! - `sign-block` — author and sign a block
//! - `verify-block` — check a signed block's author signature
//! - `simulate` — run N in-process participants over a loopback network
//!
//! ## Crate Policy
//!
//! - Argument parsing lives next to each handler; `main.rs` only
//!   dispatches.
//! - Handlers return an exit code; errors carry `anyhow` context.

pub mod block;
pub mod keygen;
pub mod simulate;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Pretty JSON to `out`, or stdout when `out` is `None`.
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    match out {
        Some(path) => std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("writing to stdout")
        }
    }
}

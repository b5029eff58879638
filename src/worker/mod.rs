//! Database worker communication.
//!
//! Database drivers live in a separate worker process; this crate stays
//! driver-agnostic and talks to it over NDJSON.
//!
//! ```text
//! ┌──────────────────────────────┐  stdin (NDJSON)   ┌──────────────────┐
//! │ WorkerClient (Rust + Tokio)  │ ────────────────▶ │  delve-worker    │
//! │ - request id correlation     │ ◀──────────────── │  (driver host)   │
//! │ - per-request timeout        │  stdout (NDJSON)  │                  │
//! └──────────────────────────────┘                   └──────────────────┘
//! ```

mod client;
mod error;
pub mod protocol;

pub use client::WorkerClient;
pub use error::{WorkerError, WorkerResult};

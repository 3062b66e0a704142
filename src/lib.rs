//! # SMPP Stress Library
//!
//! A load generator for the receiver side of an SMPP session. One end accepts a
//! connection, lets the peer bind as a receiver, then floods it with synthetic
//! `deliver_sm` PDUs while concurrently draining inbound traffic and honouring
//! the graceful `unbind` handshake.
//!
//! ## Architecture Overview
//!
//! The library is organized into a wire layer and a session engine:
//!
//! - `smpp`: PDU definitions, the length-prefixed `FrameReader`, the binary
//!   codec and the payload generators used to synthesize test traffic
//! - `session`: the `SessionCoordinator` that owns the shared connection
//!   state, plus the concurrent `Sender` and `Receiver` tasks
//! - `client`: the peer role, which binds as a receiver and acknowledges
//!   every delivery
//! - `net`: one-shot TCP accept/connect with low-latency socket options
//! - `cli`: command-line parsing and conversion into session configuration
//! - `results`: report structures and JSON output
//! - `utils`: formatting and validation helpers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use smpp_stress::session::{accept_bind, SessionConfig, SessionCoordinator};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:5432").await?;
//!     let (mut stream, _) = listener.accept().await?;
//!
//!     let config = SessionConfig::default();
//!     accept_bind(&mut stream, &config).await?;
//!
//!     let summary = SessionCoordinator::new(config).execute(stream, 10_000).await?;
//!     println!("deliver_sm_resp received: {}", summary.responses);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! Sender and Receiver run as two Tokio tasks over one split connection.
//! Writes from either task go through a single mutex so frames never
//! interleave on the wire; the unbind flag is an atomic that the Sender polls
//! once per frame. The Sender is spawned only after the Receiver has drained
//! whatever input was already readable.

/// PDU peer role: bind as receiver, acknowledge deliveries
pub mod client;

/// Command-line interface and configuration
///
/// Provides argument parsing using clap and converts user-facing options into
/// `SessionConfig` and `ClientConfig` values.
pub mod cli;

/// Library error types
pub mod error;

/// Colorized log formatting and subscriber setup
pub mod logging;

/// TCP listen, accept, connect and socket options
pub mod net;

/// Session reports and JSON output
pub mod results;

/// Concurrent send/receive engine
///
/// Contains the `SessionCoordinator`, the shared write lock and unbind flag,
/// and the two tasks that run over one connection:
/// - `Sender` floods `deliver_sm` PDUs and finishes with an `unbind`
/// - `Receiver` counts `deliver_sm_resp` PDUs and answers the peer's `unbind`
pub mod session;

/// Wire protocol: framing, codec and test payload generators
pub mod smpp;

pub mod utils;

pub use client::{ClientConfig, ClientReport, StressClient};
pub use error::{DecodeError, SessionError};
pub use results::{ResultsManager, SessionReport};
pub use session::{accept_bind, SessionConfig, SessionCoordinator, SessionSummary};
pub use smpp::{CommandId, FrameHeader, FrameReader};

/// The current version of the stress tool
///
/// Populated from Cargo.toml and embedded in every JSON report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Values mirror the classic `stress_recv` harness so existing test
/// expectations carry over unchanged.
pub mod defaults {
    /// Default number of `deliver_sm` PDUs to send
    pub const MSG_COUNT: u32 = 10_000;

    /// Default port the responder listens on
    pub const LISTEN_PORT: u16 = 5432;

    /// Default listen/connect host
    pub const HOST: &str = "0.0.0.0";

    /// System id reported in `bind_receiver_resp`
    pub const SYSTEM_ID: &str = "recv_stresser";

    /// Initial capacity of the buffer used for the bind handshake
    pub const BIND_BUFFER_LEN: usize = 512;

    /// Initial capacity of the receiver's read buffer
    pub const RECEIVE_BUFFER_LEN: usize = 1000;

    /// Largest frame any reader will grow its buffer to
    ///
    /// SMPP PDUs are small; anything beyond this is treated as a resource
    /// failure rather than an allocation request.
    pub const MAX_FRAME_LEN: usize = 64 * 1024;

    /// Sender logs progress every this many frames
    pub const PROGRESS_INTERVAL: u32 = 1000;

    /// Peer role logs progress every this many deliveries
    pub const CLIENT_PROGRESS_INTERVAL: u32 = 500;
}

//! RouterOS API protocol implementation.
//!
//! This module implements the MikroTik RouterOS API protocol, a
//! sentence-based request/reply protocol over a persistent TCP or TLS
//! connection.
//!
//! # Architecture
//!
//! The implementation is layered:
//!
//! 1. **Sentence Layer** ([`sentence`]) - length-prefixed word framing
//! 2. **Reply Layer** ([`reply`]) - aggregation of `!re`/`!done`/`!trap`/`!fatal`/`!empty`
//! 3. **Authentication Layer** ([`auth`]) - `/login` handshake, both generations
//! 4. **Dispatcher Layer** ([`dispatcher`]) - tag allocation and reply demultiplexing
//! 5. **Client API** ([`client`]) - connect, run commands, close
//!
//! Value conversion helpers for domain-layer record mapping live in
//! [`value`].
//!
//! # Modes
//!
//! A connection starts in synchronous mode: [`Client::run`] writes a command
//! and reads its own reply, one outstanding request at a time. Calling
//! [`Client::enable_async`] moves the connection to asynchronous mode for
//! the rest of its life: a single background task reads every sentence and
//! routes it by `.tag` to the request that issued it, so many commands can
//! be in flight at once.
//!
//! # Example
//!
//! ```rust,no_run
//! use rostik_proto::routeros::{Client, ClientConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect("192.168.88.1", ClientConfig::new("admin", "secret")).await?;
//! let reply = client.run(&["/interface/print", "?type=ether"]).await?;
//! println!("{} interfaces", reply.re.len());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod reply;
pub mod sentence;
pub mod value;

// Re-export main types
pub use auth::{challenge_response, decode_challenge, Credentials};
pub use client::{Client, ClientConfig, Transport};
pub use dispatcher::AsyncReply;
pub use reply::{Reply, ReplyBuilder};
pub use sentence::{encode_sentence, Sentence, SentenceReader, SentenceWriter, MAX_WORD_LEN};

/// Default API port (plain TCP).
pub const DEFAULT_PORT: u16 = 8728;

/// Default API-SSL port (TLS).
pub const DEFAULT_TLS_PORT: u16 = 8729;

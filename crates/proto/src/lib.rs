//! Protocol engine for the rostik RouterOS API client.
//!
//! This crate implements the MikroTik RouterOS API protocol:
//!
//! - **Sentence codec** - length-prefixed words terminated by a zero-length word
//! - **Reply aggregation** - `!re`/`!done`/`!trap`/`!fatal`/`!empty` control words
//! - **Login handshake** - cleartext (post-6.43) and MD5 challenge/response (pre-6.45.1)
//! - **Tag multiplexing** - many concurrent commands over one connection
//!
//! # Features
//!
//! - `routeros` (default) - RouterOS API client support
//!
//! # Example
//!
//! ```rust,no_run
//! use rostik_proto::routeros::{Client, ClientConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::connect("192.168.88.1", ClientConfig::new("admin", "secret")).await?;
//! let reply = client.run(&["/system/resource/print"]).await?;
//! for row in &reply.re {
//!     println!("uptime: {:?}", row.get("uptime"));
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [RouterOS API](https://help.mikrotik.com/docs/display/ROS/API) - protocol description
//!   (word framing, `/login`, command tags)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "routeros")]
pub mod routeros;

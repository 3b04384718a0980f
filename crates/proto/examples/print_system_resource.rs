//! Synchronous Command Example
//!
//! This example demonstrates how to:
//! - Connect to a RouterOS device and log in
//! - Run a print command synchronously
//! - Read attributes out of the reply rows
//!
//! Usage:
//!   cargo run --example print_system_resource <address> <username> <password>
//!
//! Example:
//!   cargo run --example print_system_resource 192.168.88.1 admin secret

use rostik_proto::routeros::{Client, ClientConfig};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <address> <username> <password>", args[0]);
        eprintln!("Example: {} 192.168.88.1 admin secret", args[0]);
        std::process::exit(1);
    }

    let address = &args[1];
    let username = &args[2];
    let password = &args[3];

    println!("Connecting to {}...", address);

    // Port 8728 is appended automatically. On a plain TCP connection the
    // client uses the MD5 challenge login; devices newer than 6.45.1 need
    // TLS or .allow_insecure_cleartext(true).
    let config = ClientConfig::new(username, password).allow_insecure_cleartext(true);
    let client = Client::connect(address, config).await?;
    println!("Logged in to {}", client.endpoint());

    let reply = client.run(&["/system/resource/print"]).await?;
    for row in &reply.re {
        println!("  uptime:       {}", row.get("uptime").unwrap_or("?"));
        println!("  version:      {}", row.get("version").unwrap_or("?"));
        println!("  cpu-load:     {}", row.get("cpu-load").unwrap_or("?"));
        println!("  free-memory:  {}", row.get("free-memory").unwrap_or("?"));
    }

    client.close().await;
    Ok(())
}

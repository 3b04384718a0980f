//! Asynchronous Listen Example
//!
//! This example demonstrates how to:
//! - Switch a connection to asynchronous mode
//! - Start a long-running listen command
//! - Run other commands while the listen is in flight
//! - Cancel the listen and drain its terminal trap
//!
//! Usage:
//!   cargo run --example listen_interfaces <address> <username> <password>

use rostik_proto::routeros::{Client, ClientConfig};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <address> <username> <password>", args[0]);
        std::process::exit(1);
    }

    let config = ClientConfig::new(&args[2], &args[3]).allow_insecure_cleartext(true);
    let client = Client::connect(&args[1], config).await?;

    // One-way transition: a single background task now owns the read half
    // and routes replies by tag.
    client.enable_async().await?;

    let mut listener = client.listen(&["/interface/listen"]).await?;
    let tag = listener.tag();
    println!("Listening for interface changes (tag {})...", tag);

    // The listen does not block the connection; other commands keep working.
    let identity = client.run(&["/system/identity/print"]).await?;
    if let Some(row) = identity.re.first() {
        println!("Device identity: {}", row.get("name").unwrap_or("?"));
    }

    // Print change events for ten seconds, then cancel.
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            item = listener.next() => match item {
                Some(Ok(sen)) if sen.word() == "!re" => println!("change: {}", sen),
                Some(Ok(_)) => break,
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
            _ = &mut deadline => {
                println!("Cancelling...");
                client.cancel(tag).await?;
                // The device still answers the cancelled tag with a
                // terminal trap; drain until it arrives.
                while let Some(item) = listener.next().await {
                    if item.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    client.close().await;
    Ok(())
}

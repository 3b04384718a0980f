//! Integration tests for the RouterOS API client.
//!
//! These tests drive a [`Client`] against a scripted mock device on the far
//! end of an in-memory duplex pipe, validating the complete protocol flow:
//! - both login generations (cleartext and MD5 challenge/response)
//! - synchronous command execution and device error propagation
//! - tag multiplexing in asynchronous mode
//! - cancellation and connection teardown

use rostik_platform::RostikError;
use rostik_proto::routeros::{
    Client, ClientConfig, Sentence, SentenceReader, SentenceWriter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};
use tokio::time::timeout;

const CHALLENGE_HEX: &str = "282d3e1c5f3e1c282d3e1c5f3e1c282d";
const EXPECTED_RESPONSE: &str = "0092be8cbac0556026c527c6ce18d9703e";

/// Scripted device side of the connection.
struct MockDevice {
    reader: SentenceReader<ReadHalf<DuplexStream>>,
    writer: SentenceWriter<WriteHalf<DuplexStream>>,
}

impl MockDevice {
    fn new(stream: DuplexStream) -> Self {
        let (r, w) = tokio::io::split(stream);
        Self {
            reader: SentenceReader::new(r),
            writer: SentenceWriter::new(w),
        }
    }

    async fn read(&mut self) -> Sentence {
        self.reader.read_sentence().await.expect("device read")
    }

    async fn write(&mut self, words: &[&str]) {
        self.writer.write_sentence(words).await.expect("device write");
    }

    /// Answers a cleartext login with a bare `!done`.
    async fn accept_cleartext_login(&mut self) {
        let login = self.read().await;
        assert_eq!(login.word(), "/login");
        assert_eq!(login.get("name"), Some("admin"));
        assert_eq!(login.get("password"), Some("secret"));
        self.write(&["!done"]).await;
    }
}

fn config() -> ClientConfig {
    ClientConfig::new("admin", "secret")
}

async fn connect_cleartext() -> (Client, MockDevice) {
    let (near, far) = duplex(4096);
    let mut device = MockDevice::new(far);
    let device_login = tokio::spawn(async move {
        device.accept_cleartext_login().await;
        device
    });
    let client = Client::with_transport(near, "mock:8728", true, config())
        .await
        .expect("login");
    (client, device_login.await.unwrap())
}

#[tokio::test]
async fn test_cleartext_login_single_round_trip() {
    let (client, _device) = timeout(Duration::from_secs(5), connect_cleartext())
        .await
        .unwrap();
    assert_eq!(client.endpoint(), "mock:8728");
    assert!(client.is_secure());
    client.close().await;
}

#[tokio::test]
async fn test_challenge_login_known_answer() {
    let (near, far) = duplex(4096);
    let mut device = MockDevice::new(far);
    let device = tokio::spawn(async move {
        // First round: a bare /login without credentials.
        let login = device.read().await;
        assert_eq!(login.word(), "/login");
        assert_eq!(login.get("name"), None);
        assert_eq!(login.get("password"), None);
        let ret = format!("=ret={}", CHALLENGE_HEX);
        device.write(&["!done", ret.as_str()]).await;

        // Second round carries the computed MD5 response.
        let login = device.read().await;
        assert_eq!(login.word(), "/login");
        assert_eq!(login.get("name"), Some("admin"));
        assert_eq!(login.get("response"), Some(EXPECTED_RESPONSE));
        device.write(&["!done"]).await;
    });

    // Plain transport without the cleartext opt-in selects the
    // challenge/response strategy.
    let client = timeout(
        Duration::from_secs(5),
        Client::with_transport(near, "mock:8728", false, config()),
    )
    .await
    .unwrap()
    .expect("challenge login");
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_cleartext_login_against_older_device_falls_through_to_challenge() {
    let (near, far) = duplex(4096);
    let mut device = MockDevice::new(far);
    let device = tokio::spawn(async move {
        // An older device generation answers the credentialed login with a
        // challenge anyway; the client must complete the response round.
        let login = device.read().await;
        assert_eq!(login.get("password"), Some("secret"));
        let ret = format!("=ret={}", CHALLENGE_HEX);
        device.write(&["!done", ret.as_str()]).await;

        let login = device.read().await;
        assert_eq!(login.get("response"), Some(EXPECTED_RESPONSE));
        device.write(&["!done"]).await;
    });

    let client = timeout(
        Duration::from_secs(5),
        Client::with_transport(near, "mock:8728", true, config()),
    )
    .await
    .unwrap()
    .expect("login");
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_rejected_login_fails_constructor() {
    let (near, far) = duplex(4096);
    let mut device = MockDevice::new(far);
    tokio::spawn(async move {
        let _login = device.read().await;
        device
            .write(&["!trap", "=message=cannot log in"])
            .await;
        device.write(&["!done"]).await;
    });

    let err = timeout(
        Duration::from_secs(5),
        Client::with_transport(near, "mock:8728", true, config()),
    )
    .await
    .unwrap()
    .unwrap_err();
    match err {
        RostikError::Auth(msg) => assert!(msg.contains("cannot log in")),
        other => panic!("expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_challenge_fails_constructor() {
    let (near, far) = duplex(4096);
    let mut device = MockDevice::new(far);
    tokio::spawn(async move {
        let _login = device.read().await;
        device.write(&["!done", "=ret=not-hex"]).await;
    });

    let err = timeout(
        Duration::from_secs(5),
        Client::with_transport(near, "mock:8728", false, config()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, RostikError::Auth(_)));
}

#[tokio::test]
async fn test_sync_run_collects_data_rows() {
    let (client, mut device) = connect_cleartext().await;
    let device = tokio::spawn(async move {
        let cmd = device.read().await;
        assert_eq!(cmd.word(), "/system/resource/print");
        device
            .write(&["!re", "=uptime=1w2d", "=cpu-load=3"])
            .await;
        device.write(&["!done"]).await;
    });

    let reply = timeout(
        Duration::from_secs(5),
        client.run(&["/system/resource/print"]),
    )
    .await
    .unwrap()
    .expect("run");
    assert_eq!(reply.re.len(), 1);
    assert_eq!(reply.re[0].get("uptime"), Some("1w2d"));
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_device_error_leaves_connection_usable() {
    let (client, mut device) = connect_cleartext().await;
    let device = tokio::spawn(async move {
        let _bad = device.read().await;
        device
            .write(&["!trap", "=message=no such command prefix"])
            .await;
        device.write(&["!done"]).await;

        let good = device.read().await;
        assert_eq!(good.word(), "/system/identity/print");
        device.write(&["!re", "=name=gateway"]).await;
        device.write(&["!done"]).await;
    });

    let err = client.run(&["/xxx"]).await.unwrap_err();
    match err {
        RostikError::Device(failure) => {
            assert_eq!(failure.message, "no such command prefix");
            assert!(!failure.fatal);
        }
        other => panic!("expected Device error, got {:?}", other),
    }

    // The trap was request-scoped; the connection still works.
    let reply = timeout(
        Duration::from_secs(5),
        client.run(&["/system/identity/print"]),
    )
    .await
    .unwrap()
    .expect("second run");
    assert_eq!(reply.re[0].get("name"), Some("gateway"));
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_async_tag_isolation_under_interleaving() {
    let (client, mut device) = connect_cleartext().await;
    client.enable_async().await.unwrap();

    let listener = client.listen(&["/interface/listen"]).await.unwrap();
    let printer = client.listen(&["/ip/address/print"]).await.unwrap();
    assert!(listener.tag() < printer.tag());

    let t1 = format!(".tag={}", listener.tag());
    let t2 = format!(".tag={}", printer.tag());
    let device = tokio::spawn(async move {
        let first = device.read().await;
        assert_eq!(first.word(), "/interface/listen");
        assert!(first.tag().is_some());
        let second = device.read().await;
        assert_eq!(second.word(), "/ip/address/print");

        // Interleave the two replies, with a stray unknown tag thrown in
        // that must be skipped without disturbing either request.
        device.write(&["!re", "=seq=a1", t1.as_str()]).await;
        device.write(&["!re", "=seq=b1", t2.as_str()]).await;
        device.write(&["!re", "=ignored=yes", ".tag=9999"]).await;
        device.write(&["!re", "=seq=a2", t1.as_str()]).await;
        device.write(&["!done", t2.as_str()]).await;
        device.write(&["!re", "=seq=a3", t1.as_str()]).await;
        device.write(&["!done", t1.as_str()]).await;
    });

    let printed = timeout(Duration::from_secs(5), printer.wait())
        .await
        .unwrap()
        .expect("printer reply");
    assert_eq!(printed.re.len(), 1);
    assert_eq!(printed.re[0].get("seq"), Some("b1"));

    let listened = timeout(Duration::from_secs(5), listener.wait())
        .await
        .unwrap()
        .expect("listener reply");
    let seqs: Vec<_> = listened.re.iter().map(|s| s.get("seq").unwrap()).collect();
    assert_eq!(seqs, ["a1", "a2", "a3"]);

    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_run_is_tagged_transparently_in_async_mode() {
    let (client, mut device) = connect_cleartext().await;
    client.enable_async().await.unwrap();

    let device = tokio::spawn(async move {
        let cmd = device.read().await;
        assert_eq!(cmd.word(), "/system/resource/print");
        let tag = format!(".tag={}", cmd.tag().expect("tagged command"));
        device.write(&["!re", "=uptime=4h", tag.as_str()]).await;
        device.write(&["!done", tag.as_str()]).await;
    });

    let reply = timeout(
        Duration::from_secs(5),
        client.run(&["/system/resource/print"]),
    )
    .await
    .unwrap()
    .expect("run");
    assert_eq!(reply.re[0].get("uptime"), Some("4h"));
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_cancel_retires_tag_via_terminal_trap() {
    let (client, mut device) = connect_cleartext().await;
    client.enable_async().await.unwrap();

    let listener = client.listen(&["/interface/listen"]).await.unwrap();
    let listen_tag = listener.tag();
    let t1 = format!(".tag={}", listen_tag);

    let device = tokio::spawn(async move {
        let _listen = device.read().await;
        let cancel = device.read().await;
        assert_eq!(cancel.word(), "/cancel");
        assert_eq!(cancel.get("tag"), Some(format!("{}", listen_tag)).as_deref());
        let cancel_tag = format!(".tag={}", cancel.tag().unwrap());

        // The cancel command completes, then the cancelled request gets
        // its own terminal trap.
        device.write(&["!done", cancel_tag.as_str()]).await;
        device
            .write(&["!trap", "=category=2", "=message=interrupted", t1.as_str()])
            .await;
        device.write(&["!done", t1.as_str()]).await;
    });

    timeout(Duration::from_secs(5), client.cancel(listen_tag))
        .await
        .unwrap()
        .expect("cancel");

    let err = timeout(Duration::from_secs(5), listener.wait())
        .await
        .unwrap()
        .unwrap_err();
    match err {
        RostikError::Device(failure) => assert_eq!(failure.message, "interrupted"),
        other => panic!("expected Device error, got {:?}", other),
    }
    device.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_pending_requests_fail_when_device_disconnects() {
    let (client, device) = connect_cleartext().await;
    client.enable_async().await.unwrap();

    let listener = client.listen(&["/interface/listen"]).await.unwrap();
    // Device goes away mid-request.
    drop(device);

    let err = timeout(Duration::from_secs(5), listener.wait())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RostikError::Closed(_)));
    client.close().await;
}

#[tokio::test]
async fn test_concurrent_close_is_idempotent() {
    let (client, _device) = connect_cleartext().await;
    let client = Arc::new(client);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move { client.close().await }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let err = client.run(&["/system/identity/print"]).await.unwrap_err();
    assert!(matches!(err, RostikError::Closed(_)));
}

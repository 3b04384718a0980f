//! RouterOS API client implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use rostik_proto::routeros::{Client, ClientConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Connect and log in (port 8728 is appended when missing)
//! let client = Client::connect("192.168.88.1", ClientConfig::new("admin", "secret")).await?;
//!
//! // Run a command synchronously
//! let reply = client.run(&["/system/identity/print"]).await?;
//! println!("identity: {:?}", reply.re.first().and_then(|s| s.get("name")));
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use crate::routeros::auth::{challenge_response, decode_challenge, Credentials};
use crate::routeros::dispatcher::MuxState;
use crate::routeros::reply::{Reply, ReplyBuilder};
use crate::routeros::sentence::{SentenceReader, SentenceWriter};
use crate::routeros::{DEFAULT_PORT, DEFAULT_TLS_PORT};
use rostik_platform::{RostikError, RostikResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

/// A duplex byte stream usable as the client's transport.
///
/// Implemented for anything async-readable and async-writable, so tests can
/// hand the client one end of an in-memory pipe and callers can bring their
/// own pre-established (for example tunneled) connections.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

pub(crate) type BoxedTransport = Box<dyn Transport>;
pub(crate) type Reader = SentenceReader<ReadHalf<BoxedTransport>>;
pub(crate) type Writer = SentenceWriter<WriteHalf<BoxedTransport>>;

/// Client configuration: credentials plus connection behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Login credentials.
    pub credentials: Credentials,

    /// Permit sending the password as a plain attribute over an unencrypted
    /// connection.
    ///
    /// RouterOS 6.43 and newer take the credentials in cleartext on the
    /// initial `/login`. On a non-TLS connection this library will not send
    /// them unless this flag is set, and falls back to the MD5 challenge
    /// method instead (which devices newer than 6.45.1 no longer support).
    /// For such devices the connection must be TLS, or this flag must be
    /// explicitly enabled.
    pub allow_insecure_cleartext: bool,

    /// Connection timeout for [`Client::connect`]/[`Client::connect_tls`].
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration with the given credentials and defaults:
    /// cleartext over plain TCP disabled, 30 second connect timeout.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            allow_insecure_cleartext: false,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets [`ClientConfig::allow_insecure_cleartext`].
    pub fn allow_insecure_cleartext(mut self, value: bool) -> Self {
        self.allow_insecure_cleartext = value;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }
}

/// RouterOS API client.
///
/// One `Client` owns one protocol connection. All methods take `&self`;
/// wrap the client in an [`Arc`] to share it across tasks. See the
/// [module docs](crate::routeros) for the synchronous/asynchronous mode
/// distinction.
pub struct Client {
    endpoint: String,
    secure: bool,
    /// Read half. `Some` in synchronous mode; taken by the background
    /// reader task when the connection goes asynchronous.
    pub(crate) reader: Arc<Mutex<Option<Reader>>>,
    /// Write half. Its mutex serializes command bytes on the wire.
    pub(crate) writer: Arc<Mutex<Writer>>,
    /// Serializes "write command, read until terminal" as one unit in
    /// synchronous mode, and guards the mode transition.
    pub(crate) op_lock: Arc<Mutex<()>>,
    /// Tag counter and pending-request table.
    pub(crate) mux: Arc<Mutex<MuxState>>,
    closed: Arc<Mutex<bool>>,
    pub(crate) reader_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connects to a device over plain TCP and logs in.
    ///
    /// When `addr` carries no port, the default API port 8728 is appended.
    /// The constructor fails atomically: if the login handshake fails the
    /// transport is closed before the error is returned.
    pub async fn connect(addr: &str, config: ClientConfig) -> RostikResult<Self> {
        let endpoint = fq_endpoint(addr, DEFAULT_PORT);
        let stream = dial(&endpoint, config.connect_timeout).await?;
        Self::handshake(Box::new(stream), endpoint, false, config).await
    }

    /// Connects over TLS (default port 8729) and logs in.
    ///
    /// The TLS configuration is passed through to the transport verbatim;
    /// the client does not interpret it.
    pub async fn connect_tls(
        addr: &str,
        config: ClientConfig,
        tls_config: Arc<tokio_rustls::rustls::ClientConfig>,
    ) -> RostikResult<Self> {
        let endpoint = fq_endpoint(addr, DEFAULT_TLS_PORT);
        let host = endpoint
            .rsplit_once(':')
            .map(|(h, _)| h)
            .unwrap_or(addr.trim())
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| RostikError::Config(format!("invalid TLS server name {:?}: {}", host, e)))?;

        let stream = dial(&endpoint, config.connect_timeout).await?;
        let connector = TlsConnector::from(tls_config);
        let stream = connector
            .connect(server_name, stream)
            .await
            .map_err(RostikError::Io)?;
        Self::handshake(Box::new(stream), endpoint, true, config).await
    }

    /// Logs in over an already-established duplex stream.
    ///
    /// `secure` states whether the stream is encrypted; it drives the login
    /// strategy selection exactly like a TLS connection would.
    pub async fn with_transport<T: Transport + 'static>(
        stream: T,
        endpoint: &str,
        secure: bool,
        config: ClientConfig,
    ) -> RostikResult<Self> {
        Self::handshake(Box::new(stream), endpoint.to_string(), secure, config).await
    }

    async fn handshake(
        stream: BoxedTransport,
        endpoint: String,
        secure: bool,
        config: ClientConfig,
    ) -> RostikResult<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let client = Self {
            endpoint,
            secure,
            reader: Arc::new(Mutex::new(Some(SentenceReader::new(read_half)))),
            writer: Arc::new(Mutex::new(SentenceWriter::new(write_half))),
            op_lock: Arc::new(Mutex::new(())),
            mux: Arc::new(Mutex::new(MuxState::new())),
            closed: Arc::new(Mutex::new(false)),
            reader_task: Arc::new(Mutex::new(None)),
        };
        if let Err(err) = client.login(&config).await {
            client.close().await;
            return Err(err);
        }
        Ok(client)
    }

    /// Runs the `/login` exchange. Called by the constructors.
    async fn login(&self, config: &ClientConfig) -> RostikResult<()> {
        let creds = &config.credentials;
        let reply = if self.secure || config.allow_insecure_cleartext {
            let name = format!("=name={}", creds.username());
            let password = format!("=password={}", creds.password());
            self.run(&["/login", name.as_str(), password.as_str()]).await
        } else {
            self.run(&["/login"]).await
        };
        let reply = reply.map_err(auth_rejected)?;

        let ret = match reply.done.as_ref().and_then(|done| done.get("ret")) {
            Some(ret) => ret.to_string(),
            // No challenge attribute: the post-6.45.1 login generation
            // accepted the credentials in one round trip.
            None => return Ok(()),
        };

        let challenge = decode_challenge(&ret)?;
        let name = format!("=name={}", creds.username());
        let response = format!(
            "=response={}",
            challenge_response(creds.password(), &challenge)
        );
        self.run(&["/login", name.as_str(), response.as_str()])
            .await
            .map_err(auth_rejected)?;
        Ok(())
    }

    /// Runs one command and waits for its full reply.
    ///
    /// `words` is the command path followed by `=attr=value` and
    /// `?filter=value` words; the client makes no assumption about
    /// attribute names.
    ///
    /// In synchronous mode the calling task performs the read loop itself,
    /// and concurrent `run` calls are serialized internally so their
    /// write/read cycles never interleave. In asynchronous mode the command
    /// is tagged and the reply is delivered through the shared reader.
    ///
    /// # Errors
    ///
    /// [`RostikError::Device`] when the device rejects the command (the
    /// connection stays usable unless the failure was `!fatal`);
    /// [`RostikError::Protocol`]/[`RostikError::Io`] on transport failures,
    /// which are fatal to the connection.
    pub async fn run<S: AsRef<str>>(&self, words: &[S]) -> RostikResult<Reply> {
        self.ensure_open().await?;
        if self.mux.lock().await.is_async() {
            return self.run_tagged(words).await;
        }

        // One outstanding request at a time: write plus read-until-terminal
        // is a single critical section per connection.
        let _op = self.op_lock.lock().await;
        // enable_async may have completed while this call waited for the
        // lock; a command written now must go through the tagged path.
        if self.mux.lock().await.is_async() {
            drop(_op);
            return self.run_tagged(words).await;
        }
        {
            let mut writer = self.writer.lock().await;
            writer.write_sentence(words).await?;
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or_else(|| {
            RostikError::Config("connection switched to asynchronous mode".to_string())
        })?;
        let mut builder = ReplyBuilder::new();
        loop {
            let sen = reader.read_sentence().await?;
            if builder.feed(sen) {
                break;
            }
        }
        builder.finish()
    }

    /// Returns the address this client is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns whether the transport is encrypted.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub(crate) async fn ensure_open(&self) -> RostikResult<()> {
        if *self.closed.lock().await {
            return Err(RostikError::Closed("client is closed".to_string()));
        }
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Idempotent and safe to call concurrently: the underlying stream is
    /// shut down exactly once, the background reader (if any) is stopped,
    /// and every pending asynchronous request is failed with
    /// [`RostikError::Closed`] rather than left hanging.
    ///
    /// A synchronous [`Client::run`] that is already blocked reading its
    /// reply holds the read half and is only unblocked when the device
    /// closes its side; shutting down the write half makes a well-behaved
    /// peer do so promptly.
    pub async fn close(&self) {
        {
            let mut closed = self.closed.lock().await;
            if *closed {
                return;
            }
            *closed = true;
        }

        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }

        let senders = self.mux.lock().await.drain();
        for tx in senders {
            let _ = tx.send(Err(RostikError::Closed("connection closed".to_string())));
        }

        // Drop the read half when no read is in flight; a run blocked
        // mid-read keeps its guard and is unblocked by the peer instead.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        let _ = self.writer.lock().await.shutdown().await;
    }
}

async fn dial(endpoint: &str, connect_timeout: Duration) -> RostikResult<TcpStream> {
    tokio::time::timeout(connect_timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| {
            RostikError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection timeout",
            ))
        })?
        .map_err(RostikError::Io)
}

/// Device errors during the login exchange mean rejected credentials;
/// everything else (framing, I/O) propagates unchanged.
fn auth_rejected(err: RostikError) -> RostikError {
    match err {
        RostikError::Device(failure) => RostikError::Auth(failure.to_string()),
        other => other,
    }
}

fn fq_endpoint(addr: &str, port: u16) -> String {
    if addr.parse::<std::net::SocketAddr>().is_ok() {
        return addr.to_string();
    }
    // A bare IPv6 address needs brackets before a port can be appended.
    if addr.parse::<std::net::Ipv6Addr>().is_ok() {
        return format!("[{}]:{}", addr, port);
    }
    if let Some((host, maybe_port)) = addr.rsplit_once(':') {
        if !host.contains(':')
            && !maybe_port.is_empty()
            && maybe_port.bytes().all(|b| b.is_ascii_digit())
        {
            return addr.to_string();
        }
    }
    format!("{}:{}", addr, port)
}

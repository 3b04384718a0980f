//! `/login` handshake primitives.
//!
//! RouterOS has two mutually exclusive login generations:
//!
//! - **Cleartext (6.43 and newer)**: username and password travel as plain
//!   attributes on the first `/login` command. Used when the transport is
//!   TLS or the caller explicitly allowed cleartext credentials on an
//!   unencrypted connection.
//! - **Challenge/response (before 6.45.1)**: a bare `/login` returns a
//!   hex-encoded challenge in the `ret` attribute; the client answers with
//!   `"00" + hex(MD5(0x00 || password || challenge))`.
//!
//! The strategy is picked once per connection; switching requires a
//! reconnect. [`crate::routeros::Client`] drives the exchange, this module
//! holds the credential container and the pure computations so they can be
//! tested against known-answer vectors.

use md5::{Digest, Md5};
use rostik_platform::{RostikError, RostikResult};
use zeroize::Zeroize;

/// Login credentials.
///
/// The password is wiped from memory when the credentials are dropped.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

// Manual Debug implementation so the password never reaches logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Decodes the hex `ret` challenge attribute from a `/login` reply.
///
/// # Errors
///
/// Returns [`RostikError::Auth`] when the attribute is not valid hex; the
/// connection cannot be authenticated and must be closed.
pub fn decode_challenge(ret: &str) -> RostikResult<Vec<u8>> {
    hex::decode(ret).map_err(|e| {
        RostikError::Auth(format!(
            "/login: invalid ret (challenge) hex string received: {}",
            e
        ))
    })
}

/// Computes the challenge/response login token:
/// `"00" + hex(MD5(0x00 || password || challenge))`.
///
/// # Example
///
/// ```rust
/// use rostik_proto::routeros::challenge_response;
///
/// let challenge = hex::decode("282d3e1c5f3e1c282d3e1c5f3e1c282d").unwrap();
/// assert_eq!(
///     challenge_response("secret", &challenge),
///     "0092be8cbac0556026c527c6ce18d9703e",
/// );
/// ```
pub fn challenge_response(password: &str, challenge: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.update(challenge);
    format!("00{}", hex::encode(hasher.finalize()))
}

//! RouterOS API sentence framing.
//!
//! # Wire Format
//!
//! A sentence is a sequence of words, each prefixed by a variable-length
//! size, terminated by a zero-length word:
//!
//! ```text
//! word := length word_bytes
//! sentence := word* 0x00
//! ```
//!
//! The length prefix uses the high bits of the first byte to signal its own
//! width:
//!
//! | value range       | encoding                                  |
//! |-------------------|-------------------------------------------|
//! | `0..=0x7F`        | 1 byte, as-is                             |
//! | `..=0x3FFF`       | 2 bytes, big-endian, OR `0x8000`          |
//! | `..=0x1F_FFFF`    | 3 bytes, big-endian, OR `0xC0_0000`       |
//! | `..=0xFFF_FFFF`   | 4 bytes, big-endian, OR `0xE000_0000`     |
//! | larger            | `0xF0` marker, then `u32` big-endian      |
//!
//! Prefix bytes `0xF1..=0xFF` are reserved; decoding rejects them. A
//! malformed prefix or a stream that ends mid-sentence is a framing error
//! that is fatal to the connection, since there is no way to find the next
//! sentence boundary.
//!
//! # Example
//!
//! ```rust
//! use rostik_proto::routeros::encode_sentence;
//!
//! let bytes = encode_sentence(&["/login"]);
//! assert_eq!(bytes, [6, b'/', b'l', b'o', b'g', b'i', b'n', 0]);
//! ```

use bytes::{BufMut, BytesMut};
use rostik_platform::{RostikError, RostikResult};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted word size in bytes.
///
/// The length prefix can express up to `u32::MAX`, but a device will never
/// legitimately send words anywhere near that; the cap prevents a bogus
/// prefix from triggering a huge allocation.
pub const MAX_WORD_LEN: usize = 0x0100_0000;

/// One decoded protocol sentence.
///
/// The first word is either a control word (`!re`, `!done`, `!trap`,
/// `!fatal`, `!empty`, or empty for an ignorable sentence) or, for outbound
/// sentences, a command path. The remaining words are parsed into
/// attribute pairs plus an optional `.tag` marker.
///
/// Attribute pairs keep their encounter order; [`Sentence::get`] resolves
/// duplicated names last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    word: String,
    tag: Option<String>,
    pairs: Vec<(String, String)>,
}

impl Sentence {
    /// Parses a sentence from its raw words.
    ///
    /// The first word becomes the control/command word. Each remaining word
    /// is one of:
    ///
    /// - `.tag=<id>` - the request tag marker
    /// - `=key=value` - an attribute
    /// - `?key=value` - a query filter (stored like an attribute)
    /// - anything else - treated as a bare `key=value` pair
    pub fn from_words(words: Vec<String>) -> Self {
        let mut iter = words.into_iter();
        let word = iter.next().unwrap_or_default();
        let mut tag = None;
        let mut pairs = Vec::new();
        for w in iter {
            if let Some(t) = w.strip_prefix(".tag=") {
                tag = Some(t.to_string());
                continue;
            }
            let body = match w.as_bytes().first() {
                Some(b'=') | Some(b'?') => &w[1..],
                _ => w.as_str(),
            };
            match body.split_once('=') {
                Some((k, v)) => pairs.push((k.to_string(), v.to_string())),
                None => pairs.push((body.to_string(), String::new())),
            }
        }
        Self { word, tag, pairs }
    }

    /// Returns the control or command word (the sentence's first word).
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Returns the `.tag` value, if the sentence carried one.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the attribute pairs in encounter order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Looks up an attribute by name.
    ///
    /// Duplicated attribute names resolve last-write-wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rostik_proto::routeros::Sentence;
    ///
    /// let sen = Sentence::from_words(vec![
    ///     "!re".to_string(),
    ///     "=name=ether1".to_string(),
    /// ]);
    /// assert_eq!(sen.get("name"), Some("ether1"));
    /// assert_eq!(sen.get("mtu"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word)?;
        for (k, v) in &self.pairs {
            write!(f, " ={}={}", k, v)?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " .tag={}", tag)?;
        }
        Ok(())
    }
}

fn encode_length(len: u32, buf: &mut BytesMut) {
    match len {
        0..=0x7F => buf.put_u8(len as u8),
        0x80..=0x3FFF => buf.put_u16(len as u16 | 0x8000),
        0x4000..=0x001F_FFFF => {
            buf.put_u8((len >> 16) as u8 | 0xC0);
            buf.put_u16(len as u16);
        }
        0x0020_0000..=0x0FFF_FFFF => buf.put_u32(len | 0xE000_0000),
        _ => {
            buf.put_u8(0xF0);
            buf.put_u32(len);
        }
    }
}

fn encode_words_into<S: AsRef<str>>(words: &[S], tag: Option<u64>, buf: &mut BytesMut) {
    for w in words {
        let bytes = w.as_ref().as_bytes();
        encode_length(bytes.len() as u32, buf);
        buf.put_slice(bytes);
    }
    if let Some(tag) = tag {
        let word = format!(".tag={}", tag);
        encode_length(word.len() as u32, buf);
        buf.put_slice(word.as_bytes());
    }
    buf.put_u8(0);
}

/// Encodes a sentence to wire format: each word length-prefixed, then a
/// zero-length terminator word.
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_words_into(words, None, &mut buf);
    buf.to_vec()
}

/// Reads sentences from the read half of a connection.
pub struct SentenceReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> SentenceReader<R> {
    /// Wraps a readable stream.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads and parses one sentence.
    ///
    /// # Errors
    ///
    /// - [`RostikError::Closed`] if the stream ends cleanly between
    ///   sentences
    /// - [`RostikError::Protocol`] on a reserved length prefix, an oversized
    ///   word, or a stream that ends mid-sentence
    pub async fn read_sentence(&mut self) -> RostikResult<Sentence> {
        Ok(Sentence::from_words(self.read_words().await?))
    }

    /// Reads the raw words of one sentence, without parsing them.
    pub async fn read_words(&mut self) -> RostikResult<Vec<String>> {
        let mut words = Vec::new();
        loop {
            let len = self.read_length(words.is_empty()).await? as usize;
            if len == 0 {
                return Ok(words);
            }
            if len > MAX_WORD_LEN {
                return Err(RostikError::Protocol(format!(
                    "word length {} exceeds maximum {}",
                    len, MAX_WORD_LEN
                )));
            }
            let mut buf = vec![0u8; len];
            self.inner
                .read_exact(&mut buf)
                .await
                .map_err(truncated_sentence)?;
            // The API is nominally UTF-8 but devices can emit arbitrary
            // bytes in values; lossy conversion keeps the word usable.
            words.push(String::from_utf8_lossy(&buf).into_owned());
        }
    }

    async fn read_length(&mut self, at_sentence_start: bool) -> RostikResult<u32> {
        let b0 = match self.inner.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && at_sentence_start => {
                return Err(RostikError::Closed(
                    "stream ended between sentences".to_string(),
                ));
            }
            Err(e) => return Err(truncated_sentence(e)),
        };

        if b0 & 0x80 == 0 {
            return Ok(u32::from(b0));
        }
        if b0 & 0xC0 == 0x80 {
            let b1 = self.read_prefix_byte().await?;
            return Ok((u32::from(b0 & 0x3F) << 8) | u32::from(b1));
        }
        if b0 & 0xE0 == 0xC0 {
            let b1 = self.read_prefix_byte().await?;
            let b2 = self.read_prefix_byte().await?;
            return Ok((u32::from(b0 & 0x1F) << 16) | (u32::from(b1) << 8) | u32::from(b2));
        }
        if b0 & 0xF0 == 0xE0 {
            let b1 = self.read_prefix_byte().await?;
            let b2 = self.read_prefix_byte().await?;
            let b3 = self.read_prefix_byte().await?;
            return Ok((u32::from(b0 & 0x0F) << 24)
                | (u32::from(b1) << 16)
                | (u32::from(b2) << 8)
                | u32::from(b3));
        }
        if b0 == 0xF0 {
            let mut buf = [0u8; 4];
            self.inner
                .read_exact(&mut buf)
                .await
                .map_err(truncated_sentence)?;
            return Ok(u32::from_be_bytes(buf));
        }
        Err(RostikError::Protocol(format!(
            "reserved length prefix byte 0x{:02x}",
            b0
        )))
    }

    async fn read_prefix_byte(&mut self) -> RostikResult<u8> {
        self.inner.read_u8().await.map_err(truncated_sentence)
    }
}

fn truncated_sentence(err: std::io::Error) -> RostikError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RostikError::Protocol("stream ended mid-sentence".to_string())
    } else {
        RostikError::Io(err)
    }
}

/// Writes sentences to the write half of a connection.
pub struct SentenceWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> SentenceWriter<W> {
    /// Wraps a writable stream.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one sentence and flushes it.
    pub async fn write_sentence<S: AsRef<str>>(&mut self, words: &[S]) -> RostikResult<()> {
        self.write_tagged(words, None).await
    }

    /// Writes one sentence with a `.tag=<id>` word appended, and flushes it.
    ///
    /// The whole sentence is encoded into one buffer before writing so the
    /// caller can rely on a single `write_all` per sentence.
    pub async fn write_tagged<S: AsRef<str>>(
        &mut self,
        words: &[S],
        tag: Option<u64>,
    ) -> RostikResult<()> {
        let mut buf = BytesMut::new();
        encode_words_into(words, tag, &mut buf);
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts down the underlying write half.
    pub async fn shutdown(&mut self) -> RostikResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

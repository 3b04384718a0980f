//! Reply aggregation.
//!
//! A command produces a stream of sentences: zero or more `!re` data
//! sentences followed by one terminal sentence. [`ReplyBuilder`] folds that
//! stream into a [`Reply`], classifying each sentence by its control word:
//!
//! | first word | action                                   | terminal |
//! |------------|------------------------------------------|----------|
//! | `!re`      | append to the data sequence              | no       |
//! | `!empty`   | clear the data sequence                  | no       |
//! | `!done`    | record terminal success                  | yes      |
//! | `!trap`    | record the device error, keep collecting | no       |
//! | `!fatal`   | record the device error                  | yes      |
//! | empty      | ignore                                   | no       |
//! | other      | record an unknown-reply error            | yes      |
//!
//! A `!trap` followed by `!done` still yields the device error: the device
//! reported a failure partway through an otherwise-completing operation.
//! Data sentences collected before the trap are preserved (they may carry
//! partial or diagnostic rows) and remain reachable through
//! [`ReplyBuilder::into_parts`].

use crate::routeros::sentence::Sentence;
use rostik_platform::{DeviceFailure, RostikError, RostikResult};
use std::fmt;

/// The aggregated result of one request.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Data sentences (`!re`), in arrival order.
    pub re: Vec<Sentence>,

    /// The terminal `!done` sentence, when the request completed normally.
    /// Carries reply attributes such as the `ret` login challenge.
    pub done: Option<Sentence>,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for re in &self.re {
            writeln!(f, "{}", re)?;
        }
        if let Some(done) = &self.done {
            write!(f, "{}", done)?;
        }
        Ok(())
    }
}

/// Folds a sentence stream into a [`Reply`].
///
/// Feed decoded sentences until [`ReplyBuilder::feed`] reports the terminal
/// sentence, then call [`ReplyBuilder::finish`].
///
/// # Example
///
/// ```rust
/// use rostik_proto::routeros::{ReplyBuilder, Sentence};
///
/// let mut builder = ReplyBuilder::new();
/// assert!(!builder.feed(Sentence::from_words(vec![
///     "!re".to_string(),
///     "=uptime=1w2d".to_string(),
/// ])));
/// assert!(builder.feed(Sentence::from_words(vec!["!done".to_string()])));
///
/// let reply = builder.finish().unwrap();
/// assert_eq!(reply.re.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    reply: Reply,
    error: Option<RostikError>,
}

impl ReplyBuilder {
    /// Creates an empty builder in the collecting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one sentence. Returns `true` once the terminal sentence
    /// for the request has been seen; the caller stops feeding then.
    pub fn feed(&mut self, sen: Sentence) -> bool {
        match sen.word() {
            "!re" => {
                self.reply.re.push(sen);
                false
            }
            "!done" => {
                self.reply.done = Some(sen);
                true
            }
            "!empty" => {
                // Added in ROS 7.18: the command produced zero data rows.
                // Not terminal; "!done" still follows.
                self.reply.re.clear();
                false
            }
            "!trap" => {
                if self.error.is_none() {
                    self.error = Some(RostikError::Device(device_failure(&sen, false)));
                }
                false
            }
            "!fatal" => {
                if self.error.is_none() {
                    self.error = Some(RostikError::Device(device_failure(&sen, true)));
                }
                true
            }
            // API docs say that empty sentences should be ignored.
            "" => false,
            unknown => {
                if self.error.is_none() {
                    self.error = Some(RostikError::UnknownReply(format!(
                        "unsupported control word {:?}",
                        unknown
                    )));
                }
                true
            }
        }
    }

    /// Returns the aggregated reply, or the first error recorded while
    /// collecting (a `!trap` makes the outcome an error even when the
    /// stream terminated via `!done`).
    pub fn finish(self) -> RostikResult<Reply> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.reply),
        }
    }

    /// Splits the builder into the collected reply and the recorded error,
    /// for callers that want the partial data alongside a trap.
    pub fn into_parts(self) -> (Reply, Option<RostikError>) {
        (self.reply, self.error)
    }
}

fn device_failure(sen: &Sentence, fatal: bool) -> DeviceFailure {
    let message = match sen.get("message") {
        Some(msg) => msg.to_string(),
        None => sen.to_string(),
    };
    DeviceFailure {
        message,
        attributes: sen.pairs().to_vec(),
        fatal,
    }
}

//! Reply demultiplexing for asynchronous mode.
//!
//! In asynchronous mode every outbound command carries a unique `.tag`
//! word, a single background task owns the connection's read half, and each
//! decoded sentence is routed by its tag to the request that issued it.
//! This lets many commands be in flight at once on one connection, and is
//! what makes long-running listen commands (`/interface/listen`,
//! `/ip/firewall/connection/listen`, ...) usable while other traffic
//! continues.
//!
//! Switching to asynchronous mode with [`Client::enable_async`] is a
//! one-way transition for the life of the connection: once concurrent
//! callers may have requests in flight, the synchronous single-outstanding-
//! request discipline can never be re-assumed.
//!
//! Tags are minted from a strictly increasing counter and never reused, so
//! a stale or delayed reply cannot be misattributed to a newer request.

use crate::routeros::client::{Client, Reader};
use crate::routeros::reply::{Reply, ReplyBuilder};
use crate::routeros::sentence::Sentence;
use rostik_platform::{RostikError, RostikResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Tag counter and pending-request table, one per connection.
///
/// Entries are created when a tagged command is dispatched and removed by
/// the waiting side once it sees the terminal sentence for its tag (or by
/// the read loop when the waiting side has gone away).
pub(crate) struct MuxState {
    next_tag: u64,
    handlers: HashMap<u64, mpsc::UnboundedSender<RostikResult<Sentence>>>,
    async_mode: bool,
}

impl MuxState {
    pub(crate) fn new() -> Self {
        Self {
            next_tag: 0,
            handlers: HashMap::new(),
            async_mode: false,
        }
    }

    pub(crate) fn is_async(&self) -> bool {
        self.async_mode
    }

    fn register(&mut self) -> (u64, mpsc::UnboundedReceiver<RostikResult<Sentence>>) {
        self.next_tag += 1;
        let tag = self.next_tag;
        let (tx, rx) = mpsc::unbounded_channel();
        self.handlers.insert(tag, tx);
        (tag, rx)
    }

    fn deregister(&mut self, tag: u64) {
        self.handlers.remove(&tag);
    }

    /// Empties the pending-request table, returning the senders so the
    /// caller can fan a failure out to every waiter.
    pub(crate) fn drain(&mut self) -> Vec<mpsc::UnboundedSender<RostikResult<Sentence>>> {
        self.handlers.drain().map(|(_, tx)| tx).collect()
    }
}

impl Client {
    /// Switches the connection to asynchronous mode.
    ///
    /// Spawns the background reader task that demultiplexes replies by tag
    /// for the rest of the connection's life. Subsequent [`Client::run`]
    /// calls are tagged transparently, and [`Client::listen`] becomes
    /// available. Calling this more than once is a no-op.
    pub async fn enable_async(&self) -> RostikResult<()> {
        self.ensure_open().await?;

        // Wait for an in-flight synchronous request before taking the
        // reader away from the calling tasks.
        let _op = self.op_lock.lock().await;
        {
            let mut mux = self.mux.lock().await;
            if mux.async_mode {
                return Ok(());
            }
            mux.async_mode = true;
        }

        let reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or_else(|| RostikError::Config("reader already detached".to_string()))?;
        let mux = Arc::clone(&self.mux);
        let handle = tokio::spawn(read_loop(reader, mux));
        *self.reader_task.lock().await = Some(handle);
        Ok(())
    }

    /// Dispatches a tagged command and returns a handle that yields its
    /// reply sentences as they arrive.
    ///
    /// Asynchronous mode only; call [`Client::enable_async`] first. Other
    /// commands may be dispatched while the returned [`AsyncReply`] is
    /// still live.
    pub async fn listen<S: AsRef<str>>(&self, words: &[S]) -> RostikResult<AsyncReply> {
        self.ensure_open().await?;
        let (tag, rx) = {
            let mut mux = self.mux.lock().await;
            if !mux.async_mode {
                return Err(RostikError::Config(
                    "listen requires asynchronous mode; call enable_async first".to_string(),
                ));
            }
            mux.register()
        };

        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_tagged(words, Some(tag)).await
        };
        if let Err(err) = written {
            self.mux.lock().await.deregister(tag);
            return Err(err);
        }

        Ok(AsyncReply {
            tag,
            rx,
            mux: Arc::clone(&self.mux),
            finished: false,
        })
    }

    /// Asks the device to abort the in-flight request identified by `tag`
    /// (see [`AsyncReply::tag`]).
    ///
    /// The device answers the cancelled request with a terminal trap on its
    /// own schedule; the corresponding [`AsyncReply`] keeps running until
    /// that trap arrives and must still be drained.
    pub async fn cancel(&self, tag: u64) -> RostikResult<()> {
        let tag_word = format!("=tag={}", tag);
        self.run(&["/cancel", tag_word.as_str()]).await?;
        Ok(())
    }

    /// Tagged run used transparently by [`Client::run`] in asynchronous
    /// mode.
    pub(crate) async fn run_tagged<S: AsRef<str>>(&self, words: &[S]) -> RostikResult<Reply> {
        self.listen(words).await?.wait().await
    }
}

/// The background read loop: the sole reader of the connection from the
/// moment asynchronous mode is enabled.
async fn read_loop(mut reader: Reader, mux: Arc<Mutex<MuxState>>) {
    debug!("reply read loop started");
    loop {
        match reader.read_sentence().await {
            Ok(sen) => {
                let tag = sen.tag().and_then(|t| t.parse::<u64>().ok());
                let mut mux = mux.lock().await;
                match tag {
                    Some(tag) => match mux.handlers.get(&tag) {
                        Some(tx) => {
                            if tx.send(Ok(sen)).is_err() {
                                // The waiting side dropped its handle
                                // without draining; retire the entry.
                                mux.handlers.remove(&tag);
                                debug!(tag, "dropped reply handle, tag retired");
                            }
                        }
                        // A tag nobody registered is a protocol or
                        // implementation bug, but one anomaly must not
                        // starve the other tags' traffic.
                        None => warn!(tag, "sentence for unknown tag skipped"),
                    },
                    None => warn!(
                        sentence = %sen,
                        "untagged sentence in asynchronous mode skipped"
                    ),
                }
            }
            Err(err) => {
                let msg = err.to_string();
                match err {
                    RostikError::Closed(_) => debug!("connection closed: {}", msg),
                    _ => warn!("read loop failed: {}", msg),
                }
                // Fail every pending request rather than leaving it hung.
                let senders = mux.lock().await.drain();
                for tx in senders {
                    let _ = tx.send(Err(RostikError::Closed(msg.clone())));
                }
                break;
            }
        }
    }
    debug!("reply read loop stopped");
}

/// Handle for one in-flight tagged request.
///
/// Yields the request's sentences in arrival order. Once the terminal
/// sentence (`!done` or `!fatal`) has been yielded, the handle deregisters
/// its tag and [`AsyncReply::next`] returns `None` from then on.
pub struct AsyncReply {
    tag: u64,
    rx: mpsc::UnboundedReceiver<RostikResult<Sentence>>,
    mux: Arc<Mutex<MuxState>>,
    finished: bool,
}

impl AsyncReply {
    /// The tag identifying this request, for [`Client::cancel`].
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Receives the next sentence for this request, including the terminal
    /// one.
    ///
    /// Returns `None` once the request is complete, and
    /// `Some(Err(RostikError::Closed(_)))` if the connection failed while
    /// the request was pending.
    pub async fn next(&mut self) -> Option<RostikResult<Sentence>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Ok(sen)) => {
                if matches!(sen.word(), "!done" | "!fatal") {
                    self.retire().await;
                }
                Some(Ok(sen))
            }
            Some(Err(err)) => {
                // Table already drained by the read loop.
                self.finished = true;
                Some(Err(err))
            }
            None => {
                self.retire().await;
                None
            }
        }
    }

    /// Drains the remaining sentences and aggregates them into a [`Reply`].
    pub async fn wait(mut self) -> RostikResult<Reply> {
        let mut builder = ReplyBuilder::new();
        loop {
            match self.next().await {
                Some(Ok(sen)) => {
                    if builder.feed(sen) {
                        return builder.finish();
                    }
                }
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(RostikError::Closed(
                        "reply channel closed before terminal sentence".to_string(),
                    ))
                }
            }
        }
    }

    async fn retire(&mut self) {
        if !self.finished {
            self.finished = true;
            self.mux.lock().await.deregister(self.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_strictly_increase() {
        let mut mux = MuxState::new();
        let (t1, _rx1) = mux.register();
        let (t2, _rx2) = mux.register();
        let (t3, _rx3) = mux.register();
        assert!(t1 < t2 && t2 < t3);
    }

    #[test]
    fn test_deregistered_tag_not_reused() {
        let mut mux = MuxState::new();
        let (t1, _rx1) = mux.register();
        mux.deregister(t1);
        let (t2, _rx2) = mux.register();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_drain_empties_table() {
        let mut mux = MuxState::new();
        let (_t1, _rx1) = mux.register();
        let (_t2, _rx2) = mux.register();
        let senders = mux.drain();
        assert_eq!(senders.len(), 2);
        assert!(mux.handlers.is_empty());
    }
}

//! Outbound write serialization
//!
//! Buffers handed to [`AsyncTcpClient::write`](crate::io::AsyncTcpClient::write)
//! arrive at the client task through its command channel, already in call order.
//! [`WriteQueue`] is the single consumer: it keeps at most one buffer in flight
//! and holds the rest in FIFO order until the previous write completes.

use bytes::Bytes;
use std::collections::VecDeque;
use tracing::warn;

/// Statistics for the write queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Total buffers accepted by `write`
    pub enqueued: u64,
    /// Buffers fully written to the transport
    pub written: u64,
    /// Buffers whose write failed
    pub failed: u64,
    /// Buffers dropped by a deliberate disconnect
    pub discarded: u64,
    /// Buffers currently waiting (excluding the one in flight)
    pub current_size: usize,
    /// Peak number of waiting buffers
    pub peak_size: usize,
}

/// FIFO of pending writes with a single-flight guard
#[derive(Debug, Default)]
pub(crate) struct WriteQueue {
    pending: VecDeque<Bytes>,
    in_flight: bool,
    limit: Option<usize>,
    stats: WriteStats,
}

impl WriteQueue {
    /// Queue holding at most `limit` waiting buffers (`None` = unbounded)
    pub(crate) fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Accept a buffer from the caller
    ///
    /// Returns the buffer back when it should be submitted right away: nothing
    /// is in flight and the transport is `ready`. Otherwise it joins the tail,
    /// or is discarded when the waiting queue is full.
    pub(crate) fn offer(&mut self, data: Bytes, ready: bool) -> Option<Bytes> {
        self.stats.enqueued += 1;
        if self.in_flight || !ready {
            if self.is_full() {
                self.stats.discarded += 1;
                warn!(
                    bytes = data.len(),
                    queued = self.pending.len(),
                    "Write queue full, buffer discarded"
                );
                return None;
            }
            self.pending.push_back(data);
            self.update_size();
            return None;
        }
        self.in_flight = true;
        Some(data)
    }

    /// The in-flight write finished; returns the next buffer to submit
    pub(crate) fn complete(&mut self) -> Option<Bytes> {
        self.stats.written += 1;
        self.next()
    }

    /// The in-flight write failed, or its connection was torn down before it
    /// finished; waiting buffers stay queued
    pub(crate) fn fail(&mut self) {
        self.stats.failed += 1;
        self.in_flight = false;
    }

    /// A fresh connection is ready; returns the head buffer if nothing is in flight
    pub(crate) fn resume(&mut self) -> Option<Bytes> {
        if self.in_flight {
            return None;
        }
        self.next()
    }

    /// Drop everything still waiting
    pub(crate) fn clear(&mut self) {
        self.stats.discarded += self.pending.len() as u64;
        self.pending.clear();
        self.in_flight = false;
        self.update_size();
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.pending.len() >= limit)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn stats(&self) -> WriteStats {
        self.stats.clone()
    }

    fn next(&mut self) -> Option<Bytes> {
        let next = self.pending.pop_front();
        self.in_flight = next.is_some();
        self.update_size();
        next
    }

    fn update_size(&mut self) {
        self.stats.current_size = self.pending.len();
        if self.stats.current_size > self.stats.peak_size {
            self.stats.peak_size = self.stats.current_size;
        }
    }
}

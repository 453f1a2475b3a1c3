//! Channel transport for threaded workers.

use crate::search::message::{Envelope, Message, Transport};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// Stop signal shared between the coordinator and every worker thread.
#[derive(Debug, Default)]
pub struct StopFlag {
    should_stop: AtomicBool,
}

impl StopFlag {
    /// Check if workers should abandon the search.
    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    /// Signal all workers to stop.
    pub fn signal_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }
}

/// One worker's endpoint: its own inbox plus a sender to every inbox.
///
/// Each inbox is a single unbounded FIFO channel, so messages between a
/// pair of workers, tokens included, arrive in send order.
pub struct ChannelTransport {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    /// Head of the inbox, taken off the channel by [`Transport::wait`].
    pending: Option<Envelope>,
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.peers.len()
    }

    fn send(&mut self, to: usize, message: Message) {
        let Some(peer) = self.peers.get(to) else {
            trace!(rank = self.rank, to, "dropping message to unknown rank");
            return;
        };
        // A receiver only disappears once its worker has finished.
        if peer
            .send(Envelope {
                from: self.rank,
                message,
            })
            .is_err()
        {
            trace!(rank = self.rank, to, "peer has already exited");
        }
    }

    fn try_recv(&mut self) -> Option<Envelope> {
        if let Some(envelope) = self.pending.take() {
            return Some(envelope);
        }
        match self.inbox.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn wait(&mut self, timeout: Duration) {
        if self.pending.is_some() {
            return;
        }
        match self.inbox.recv_timeout(timeout) {
            Ok(envelope) => self.pending = Some(envelope),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }
}

/// Create one fully connected transport per worker.
pub fn create_transports(num_workers: usize) -> Vec<ChannelTransport> {
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..num_workers).map(|_| unbounded()).unzip();
    receivers
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| ChannelTransport {
            rank,
            peers: senders.clone(),
            inbox,
            pending: None,
        })
        .collect()
}

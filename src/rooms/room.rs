//! The room hub.
//!
//! A [`Room`] is a cheap handle onto a single coordination task that owns the
//! set of connected clients. Joining, leaving and forwarding are signals sent
//! to that task over one FIFO channel; the task is the only code that ever
//! touches the membership map, so no lock guards it.
//!
//! Each member is represented by the sending half of its bounded mailbox.
//! Fan-out never waits on a mailbox: a member whose mailbox is full loses that
//! message and is evicted. Eviction closes its mailbox and wakes the member's
//! removal receiver, which the client uses to drop its connection.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> ClientId {
        ClientId(Uuid::now_v7())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The room's view of a client: its id and the producer side of its mailbox.
/// The room never sees the socket.
#[derive(Debug)]
pub struct Member {
    id: ClientId,
    mailbox: mpsc::Sender<Message>,
    evicted: Option<oneshot::Sender<()>>,
}

impl Member {
    /// Also returns the receiver that resolves once the room lets go of the
    /// member: with `Ok(())` if it was evicted, with an error if it left or
    /// the room shut down.
    pub fn new(id: ClientId, mailbox: mpsc::Sender<Message>) -> (Member, oneshot::Receiver<()>) {
        let (evicted, removed) = oneshot::channel();
        let member = Member {
            id,
            mailbox,
            evicted: Some(evicted),
        };
        (member, removed)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    fn evict(&mut self) {
        if let Some(evicted) = self.evicted.take() {
            let _ = evicted.send(());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomStats {
    pub members: usize,
    /// Messages the room has fanned out.
    pub forwarded: u64,
    /// Deliveries dropped because a mailbox was full.
    pub dropped: u64,
}

enum Signal {
    Join(Member),
    Leave(ClientId),
    Forward(Message),
    Members(oneshot::Sender<Vec<ClientId>>),
    Stats(oneshot::Sender<RoomStats>),
}

#[derive(Debug, Clone)]
pub struct Room {
    signals: mpsc::UnboundedSender<Signal>,
}

impl Room {
    /// Starts the coordination task. It runs until every handle is dropped.
    pub fn spawn() -> Room {
        let (signals, rx) = mpsc::unbounded_channel();
        tokio::spawn(Hub::new(rx).run());
        Room { signals }
    }

    /// Admits a member. It only sees messages forwarded after this.
    pub fn join(&self, member: Member) {
        self.signal(Signal::Join(member));
    }

    /// Removes a client and closes its mailbox. Leaving twice, or leaving
    /// without having joined, does nothing.
    pub fn leave(&self, id: ClientId) {
        self.signal(Signal::Leave(id));
    }

    pub fn forward(&self, message: Message) {
        self.signal(Signal::Forward(message));
    }

    /// Current members, after every signal sent before this call has been
    /// handled.
    pub async fn members(&self) -> Vec<ClientId> {
        let (tx, rx) = oneshot::channel();
        self.signal(Signal::Members(tx));
        rx.await.unwrap_or_default()
    }

    pub async fn stats(&self) -> RoomStats {
        let (tx, rx) = oneshot::channel();
        self.signal(Signal::Stats(tx));
        rx.await.unwrap_or_default()
    }

    fn signal(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            debug!("room is closed, signal ignored");
        }
    }
}

struct Hub {
    signals: mpsc::UnboundedReceiver<Signal>,
    members: HashMap<ClientId, Member>,
    forwarded: u64,
    dropped: u64,
}

impl Hub {
    fn new(signals: mpsc::UnboundedReceiver<Signal>) -> Hub {
        Hub {
            signals,
            members: HashMap::new(),
            forwarded: 0,
            dropped: 0,
        }
    }

    async fn run(mut self) {
        info!("room open");
        while let Some(signal) = self.signals.recv().await {
            match signal {
                Signal::Join(member) => self.admit(member),
                Signal::Leave(id) => self.remove(id),
                Signal::Forward(message) => self.fan_out(message),
                Signal::Members(reply) => {
                    let _ = reply.send(self.members.keys().copied().collect());
                }
                Signal::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
            }
        }
        info!(members = self.members.len(), "room closed");
    }

    fn admit(&mut self, member: Member) {
        debug!(client = %member.id, "client joined");
        self.members.insert(member.id, member);
    }

    fn remove(&mut self, id: ClientId) {
        // dropping the member drops the mailbox sender
        if self.members.remove(&id).is_some() {
            debug!(client = %id, "client left");
        }
    }

    fn fan_out(&mut self, message: Message) {
        self.forwarded += 1;
        let mut dropped = 0;

        self.members.retain(|id, member| match member.mailbox.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(client = %id, "mailbox full, dropping message and evicting client");
                member.evict();
                dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = %id, "mailbox already closed, removing client");
                false
            }
        });

        self.dropped += dropped;
    }

    fn stats(&self) -> RoomStats {
        RoomStats {
            members: self.members.len(),
            forwarded: self.forwarded,
            dropped: self.dropped,
        }
    }
}

use std::{fmt::Display, num::NonZeroUsize, time::Duration};

use axum::extract::ws::{Message as Frame, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use super::{
    message::{Identity, IncomingFrame, Message},
    room::{ClientId, Member, Room},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket receive failed: {0}")]
    Receive(String),
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub mailbox_capacity: NonZeroUsize,
    pub keepalive: Duration,
}

const MAILBOX_CAPACITY: NonZeroUsize = NonZeroUsize::new(256).unwrap();
const KEEPALIVE: Duration = Duration::from_secs(30);

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            mailbox_capacity: MAILBOX_CAPACITY,
            keepalive: KEEPALIVE,
        }
    }
}

/// One connected participant. Lives exactly as long as its connection.
pub struct Client {
    id: ClientId,
    room: Room,
    identity: Identity,
    keepalive: Duration,
    mailbox: mpsc::Receiver<Message>,
    member: Member,
    removed: oneshot::Receiver<()>,
}

impl Client {
    pub fn new(room: Room, identity: Identity, config: ClientConfig) -> Client {
        let id = ClientId::new();
        let (tx, mailbox) = mpsc::channel(config.mailbox_capacity.get());
        let (member, removed) = Member::new(id, tx);

        Client {
            id,
            room,
            identity,
            keepalive: config.keepalive,
            mailbox,
            member,
            removed,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Joins the room and pumps messages until either direction fails or the
    /// room evicts the client. Either way the socket is dropped on return.
    pub async fn run(self, socket: WebSocket) {
        let Client { id, room, identity, keepalive, mailbox, member, mut removed } = self;
        let (sink, stream) = socket.split();

        room.join(member);
        info!(client = %id, name = %identity.name, "client connected");

        let mut writer = tokio::spawn(write_pump(sink, mailbox, keepalive));

        tokio::select! {
            read = read_pump(stream, &room, &identity) => {
                if let Err(e) = read {
                    debug!(client = %id, "read pump stopped: {e}");
                }
            }
            write = &mut writer => {
                if let Ok(Err(e)) = write {
                    debug!(client = %id, "write pump stopped: {e}");
                }
            }
            evicted = &mut removed => {
                match evicted {
                    Ok(()) => warn!(client = %id, "evicted, closing connection"),
                    Err(_) => debug!(client = %id, "removed from room, closing connection"),
                }
                // the writer may be parked on a peer that stopped reading
                writer.abort();
            }
        }

        // closes the mailbox, so a still running writer drains it and exits
        room.leave(id);
        info!(client = %id, "client disconnected");
    }
}

/// Moves messages from the mailbox onto the connection, pinging while idle.
/// Returns once the mailbox is closed or a send fails.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut mailbox: mpsc::Receiver<Message>,
    keepalive: Duration,
) -> Result<(), ClientError>
where
    S: Sink<Frame> + Unpin,
    S::Error: Display,
{
    let mut ticker = time::interval_at(Instant::now() + keepalive, keepalive);

    loop {
        tokio::select! {
            message = mailbox.recv() => {
                let Some(message) = message else {
                    let _ = sink.send(Frame::Close(None)).await;
                    return Ok(());
                };
                let text = serde_json::to_string(&message)?;
                sink.send(Frame::Text(text.into()))
                    .await
                    .map_err(|e| ClientError::Send(e.to_string()))?;
            }
            _ = ticker.tick() => {
                sink.send(Frame::Ping(Default::default()))
                    .await
                    .map_err(|e| ClientError::Send(e.to_string()))?;
            }
        }
    }
}

/// Reads frames off the connection and forwards each one to the room as a
/// message from `identity`. Returns when the peer closes.
pub(crate) async fn read_pump<S, E>(
    mut stream: S,
    room: &Room,
    identity: &Identity,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| ClientError::Receive(e.to_string()))?;
        let incoming: IncomingFrame = match frame {
            Frame::Text(text) => serde_json::from_str(text.as_str())?,
            Frame::Binary(bytes) => serde_json::from_slice(&bytes)?,
            Frame::Ping(_) | Frame::Pong(_) => continue,
            Frame::Close(_) => break,
        };

        room.forward(Message::new(identity, incoming.body));
    }

    Ok(())
}

use serde::{Deserialize, Serialize};

/// Who a message is from, stamped onto every message a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub avatar_url: String,
}

/// One chat utterance as it goes out to every member of the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    name: String,
    body: String,
    #[serde(rename = "avatarURL")]
    avatar_url: String,
}

impl Message {
    pub fn new(from: &Identity, body: String) -> Message {
        Message {
            name: from.name.clone(),
            body,
            avatar_url: from.avatar_url.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }
}

/// What the browser sends us. Anything besides the body is ignored, the
/// sender's name and avatar come from the session.
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingFrame {
    pub(crate) body: String,
}

use std::sync::Arc;

use axum::{
    Extension, debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{
    AppState,
    avatars::{TryAvatars, resolve},
    config::Settings,
    session::ChatUser,
};

use super::{Client, ClientConfig, Identity, Room};

/// `GET /room`: the signed-in user's browser asking to join the chat.
#[debug_handler(state = AppState)]
pub async fn room_ws(
    State(room): State<Room>,
    State(avatars): State<Arc<TryAvatars>>,
    State(settings): State<Arc<Settings>>,
    Extension(user): Extension<ChatUser>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(user = %user.unique_id, "websocket upgrade rejected: {rejection}");
            return rejection.into_response();
        }
    };

    let avatar_url = resolve(avatars, user.clone())
        .await
        .unwrap_or_else(|e| {
            debug!(user = %user.unique_id, "{e}, using a blank avatar");
            String::new()
        });
    let identity = Identity {
        name: user.name,
        avatar_url,
    };

    upgrade(ws, room, identity, settings.client_config())
}

/// Finishes the handshake and runs a new client for `identity` in `room`.
/// Nothing touches the room unless the upgrade succeeds.
pub fn upgrade(
    ws: WebSocketUpgrade,
    room: Room,
    identity: Identity,
    config: ClientConfig,
) -> Response {
    ws.on_failed_upgrade(|e| warn!("websocket upgrade failed: {e}"))
        .on_upgrade(move |socket| Client::new(room, identity, config).run(socket))
}

mod client;
mod message;
mod room;
pub mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use client::{Client, ClientConfig, ClientError};
pub use message::{Identity, Message};
pub use room::{ClientId, Member, Room, RoomStats};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/room", get(ws::room_ws))
}

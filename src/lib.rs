pub mod auth;
pub mod avatars;
pub mod config;
pub mod pages;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::{auth::Providers, avatars::TryAvatars, config::Settings, rooms::Room};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub room: Room,
    pub providers: Providers,
    pub avatars: Arc<TryAvatars>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wires up the process-wide pieces and starts the room.
    pub fn new(settings: Settings, providers: Providers) -> AppState {
        AppState {
            room: Room::spawn(),
            providers,
            avatars: Arc::new(TryAvatars::standard(&settings.avatars_dir)),
            settings: Arc::new(settings),
        }
    }
}

/// Every route of the service. Needs a session layer on top.
pub fn app(state: AppState) -> Router {
    let avatars_dir = state.settings.avatars_dir.clone();

    let gated = Router::new()
        .route("/chat", get(pages::chat))
        .route("/upload", get(pages::upload))
        .route("/uploader", post(avatars::uploader))
        .merge(rooms::router())
        .route_layer(middleware::from_fn(auth::must_auth));

    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login))
        .merge(auth::router())
        .merge(gated)
        .nest_service("/avatars", ServeDir::new(avatars_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_opt_str_field(&self, field: &str) -> Option<String>;
    /// Ids come as strings from some providers and numbers from others.
    fn get_id_field(&self, field: &str) -> AppResult<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_opt_str_field(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    fn get_id_field(&self, field: &str) -> AppResult<String> {
        match self.get(field) {
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::String(_)) => self.get_str_field(field),
            _ => Err(format!("expected {field} in {self}").into()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}", self.0),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(std::io::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::extract::multipart::MultipartError);
apperr_impl!(reqwest::Error);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self(anyhow::Error::from(err))
    }
}

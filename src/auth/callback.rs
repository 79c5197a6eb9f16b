use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::Redirect,
};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, AppState,
    session::{CSRF_STATE, PKCE_VERIFIER, USER},
};

use super::{Provider, Providers};

#[derive(Deserialize)]
pub(crate) struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn callback(
    Path(provider): Path<Provider>,
    Query(CallbackQuery { state, code, error }): Query<CallbackQuery>,
    State(providers): State<Providers>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(error) = error {
        return Err(format!("{provider} login refused: {error}").into());
    }
    let state = CsrfToken::new(state.ok_or("OAuth: without state")?);
    let code = AuthorizationCode::new(code.ok_or("OAuth: without code")?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err("no csrf_state".into());
    };
    if state.secret().as_str() != stored_state.as_str() {
        return Err("csrf tokens don't match".into());
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err("no pkce_verifier".into());
    };

    let access_token = providers
        .exchange(provider, code, PkceCodeVerifier::new(pkce_verifier))
        .await?;
    let user = providers.fetch_user(provider, &access_token).await?;

    session.cycle_id().await?;
    session.insert(USER, &user).await?;

    info!(user = %user.unique_id, %provider, "welcome {}", user.name);
    Ok(Redirect::to("/chat"))
}

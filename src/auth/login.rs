use axum::{
    debug_handler,
    extract::{Path, State},
    response::Redirect,
};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    session::{CSRF_STATE, PKCE_VERIFIER},
};

use super::{Provider, Providers};

/// Sends the browser off to the provider's consent page.
#[debug_handler(state = AppState)]
pub(crate) async fn login(
    Path(provider): Path<Provider>,
    State(providers): State<Providers>,
    session: Session,
) -> AppResult<Redirect> {
    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = providers
        .client(provider)
        .authorize_url(CsrfToken::new_random)
        .add_scopes(provider.scopes().iter().map(|s| Scope::new(s.to_string())))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;

    Ok(Redirect::to(authorize_url.as_str()))
}

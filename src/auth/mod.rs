use axum::{
    Router,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tower_sessions::Session;
use tracing::warn;

use crate::{
    AppState,
    session::{ChatUser, USER},
};

mod callback;
mod login;
mod logout;
mod providers;

pub use providers::{Provider, Providers};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login/{provider}", get(login::login))
        .route("/auth/callback/{provider}", get(callback::callback))
        .route("/logout", get(logout::logout))
}

/// Lets a request through only if its session carries a signed-in user, and
/// hands that user to the handler as an `Extension<ChatUser>`. Everyone else
/// goes to the login page.
pub async fn must_auth(session: Session, mut request: Request, next: Next) -> Response {
    match session.get::<ChatUser>(USER).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => Redirect::to("/login").into_response(),
        Err(e) => {
            warn!("session lookup failed: {e}");
            Redirect::to("/login").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension,
        body::Body,
        http::{Request, StatusCode, header},
        middleware,
    };
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;

    fn gated() -> Router {
        Router::new()
            .route(
                "/chat",
                get(|Extension(user): Extension<ChatUser>| async move { user.name }),
            )
            .route_layer(middleware::from_fn(must_auth))
            .route(
                "/pretend-login",
                get(|session: Session| async move {
                    let user = ChatUser::new(Provider::Github, "7", "Grace".into(), None, None);
                    session.insert(USER, user).await.unwrap();
                }),
            )
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn anonymous_request_goes_to_login() {
        let response = gated()
            .oneshot(Request::get("/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn signed_in_request_reaches_handler_with_user() {
        let app = gated();

        let login = app
            .clone()
            .oneshot(Request::get("/pretend-login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = login.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        let response = app
            .oneshot(
                Request::get("/chat")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Grace");
    }
}

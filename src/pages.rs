use std::sync::Arc;

use axum::{
    Extension, debug_handler,
    extract::State,
    response::{Html, Redirect},
};

use crate::{
    AppState,
    auth::Provider,
    avatars::{TryAvatars, resolve},
    session::ChatUser,
};

macro_rules! include_res {
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

#[debug_handler]
pub(crate) async fn index() -> Redirect {
    Redirect::to("/chat")
}

#[debug_handler]
pub(crate) async fn login() -> Html<String> {
    let providers: String = Provider::ALL
        .iter()
        .map(|p| {
            include_res!(str, "/pages/provider_item.html")
                .replace("{slug}", p.slug())
                .replace("{name}", &p.to_string())
        })
        .collect();

    Html(include_res!(str, "/pages/login.html").replace("{providers}", &providers))
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat(
    State(avatars): State<Arc<TryAvatars>>,
    Extension(user): Extension<ChatUser>,
) -> Html<String> {
    let avatar_url = resolve(avatars, user.clone()).await.unwrap_or_default();

    Html(chat_page(&user.name, &avatar_url))
}

/// The URL goes in first: a user name is free text and may itself contain
/// `{avatar_url}`.
fn chat_page(name: &str, avatar_url: &str) -> String {
    include_res!(str, "/pages/chat.html")
        .replace("{avatar_url}", &escape(avatar_url))
        .replace("{name}", &escape(name))
}

#[debug_handler]
pub(crate) async fn upload() -> Html<&'static str> {
    Html(include_res!(str, "/pages/upload.html"))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b>"Tom" & 'Jerry'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn chat_page_fills_placeholders_once() {
        let page = chat_page("{avatar_url} <me>", "/avatars/me.png");

        assert!(page.contains("{avatar_url} &lt;me&gt;"));
        assert!(page.contains("/avatars/me.png"));
        assert!(!page.contains("{name}"));
    }

    #[tokio::test]
    async fn login_lists_every_provider() {
        let Html(page) = login().await;

        for provider in Provider::ALL {
            assert!(page.contains(&format!("/auth/login/{}", provider.slug())));
        }
        assert!(!page.contains("{providers}"));
    }
}

use std::fmt;

use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    PkceCodeVerifier, RedirectUrl, TokenResponse, TokenUrl, basic::BasicClient,
};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AppResult, GetField,
    config::{Secrets, Settings},
    session::ChatUser,
};

type ProviderClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Google,
    Facebook,
    Github,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Facebook, Provider::Github];

    pub fn slug(&self) -> &'static str {
        use Provider::*;
        match self {
            Google => "google",
            Facebook => "facebook",
            Github => "github",
        }
    }

    fn auth_url(&self) -> &'static str {
        use Provider::*;
        match self {
            Google => "https://accounts.google.com/o/oauth2/auth",
            Facebook => "https://www.facebook.com/v19.0/dialog/oauth",
            Github => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_url(&self) -> &'static str {
        use Provider::*;
        match self {
            Google => "https://oauth2.googleapis.com/token",
            Facebook => "https://graph.facebook.com/v19.0/oauth/access_token",
            Github => "https://github.com/login/oauth/access_token",
        }
    }

    fn userinfo_url(&self) -> &'static str {
        use Provider::*;
        match self {
            Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Facebook => "https://graph.facebook.com/me?fields=id,name,email,picture",
            Github => "https://api.github.com/user",
        }
    }

    pub(crate) fn scopes(&self) -> &'static [&'static str] {
        use Provider::*;
        match self {
            Google => &["openid", "email", "profile"],
            Facebook => &["email", "public_profile"],
            Github => &["read:user", "user:email"],
        }
    }

    /// Turns the provider's user-info document into our user.
    pub(crate) fn user_from_profile(&self, body: &Value) -> AppResult<ChatUser> {
        let id = body.get_id_field("id")?;
        let email = body.get_opt_str_field("email");

        let (name, picture) = match self {
            Provider::Google => (body.get_opt_str_field("name"), body.get_opt_str_field("picture")),
            Provider::Facebook => (
                body.get_opt_str_field("name"),
                body.pointer("/picture/data/url").and_then(Value::as_str).map(str::to_owned),
            ),
            Provider::Github => (
                body.get_opt_str_field("name").or_else(|| body.get_opt_str_field("login")),
                body.get_opt_str_field("avatar_url"),
            ),
        };
        let name = name.unwrap_or_else(|| "Nameless User".to_owned());

        Ok(ChatUser::new(*self, &id, name, email, picture))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// OAuth clients for every provider, built once from the secrets file.
#[derive(Clone)]
pub struct Providers {
    google: ProviderClient,
    facebook: ProviderClient,
    github: ProviderClient,
    http: reqwest::Client,
}

impl Providers {
    pub fn new(secrets: &Secrets, settings: &Settings) -> anyhow::Result<Providers> {
        let client = |provider: Provider| -> anyhow::Result<ProviderClient> {
            let credentials = secrets.credentials(provider);

            Ok(BasicClient::new(ClientId::new(credentials.client_id.clone()))
                .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
                .set_auth_uri(AuthUrl::new(provider.auth_url().to_owned())?)
                .set_token_uri(TokenUrl::new(provider.token_url().to_owned())?)
                .set_redirect_uri(RedirectUrl::new(settings.redirect_url(provider))?))
        };

        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Providers {
            google: client(Provider::Google)?,
            facebook: client(Provider::Facebook)?,
            github: client(Provider::Github)?,
            http,
        })
    }

    pub fn client(&self, provider: Provider) -> &ProviderClient {
        use Provider::*;
        match provider {
            Google => &self.google,
            Facebook => &self.facebook,
            Github => &self.github,
        }
    }

    /// Trades the authorization code for an access token.
    pub async fn exchange(
        &self,
        provider: Provider,
        code: AuthorizationCode,
        pkce_verifier: PkceCodeVerifier,
    ) -> AppResult<String> {
        let token = self
            .client(provider)
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await?;

        Ok(token.access_token().secret().to_owned())
    }

    pub async fn fetch_user(&self, provider: Provider, access_token: &str) -> AppResult<ChatUser> {
        let body: Value = self
            .http
            .get(provider.userinfo_url())
            .bearer_auth(access_token)
            .header(USER_AGENT, concat!("roomchat/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        provider.user_from_profile(&body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn google_profile() {
        let body = json!({
            "id": "1234",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "picture": "https://lh3.googleusercontent.com/ada"
        });
        let user = Provider::Google.user_from_profile(&body).unwrap();

        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.picture.as_deref(), Some("https://lh3.googleusercontent.com/ada"));
        assert_eq!(user.unique_id, crate::session::email_hash("ada@example.com"));
    }

    #[test]
    fn github_profile_with_numeric_id_and_no_name() {
        let body = json!({
            "id": 583231,
            "login": "octocat",
            "name": null,
            "email": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231"
        });
        let user = Provider::Github.user_from_profile(&body).unwrap();

        assert_eq!(user.name, "octocat");
        assert_eq!(user.unique_id, "github-583231");
        assert_eq!(user.email, None);
    }

    #[test]
    fn facebook_profile_nested_picture() {
        let body = json!({
            "id": "10",
            "name": "Zuck",
            "picture": { "data": { "url": "https://graph.facebook.com/10/picture" } }
        });
        let user = Provider::Facebook.user_from_profile(&body).unwrap();

        assert_eq!(user.picture.as_deref(), Some("https://graph.facebook.com/10/picture"));
        assert_eq!(user.unique_id, "facebook-10");
    }

    #[test]
    fn profile_without_id_is_an_error() {
        assert!(Provider::Google.user_from_profile(&json!({ "name": "x" })).is_err());
    }

    #[test]
    fn provider_from_path_segment() {
        let provider: Provider = serde_json::from_str("\"github\"").unwrap();
        assert_eq!(provider, Provider::Github);
        assert_eq!(provider.slug(), "github");
        assert_eq!(provider.to_string(), "Github");
    }
}

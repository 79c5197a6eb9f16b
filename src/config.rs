use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::{auth::Provider, rooms::ClientConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed secrets file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid security key")]
    SecurityKey,
    #[error("invalid {provider} oauth {field}")]
    Credentials {
        provider: Provider,
        field: &'static str,
    },
}

/// Command line, with every flag also readable from the environment.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Group chat server")]
pub struct Settings {
    /// Address to listen on.
    #[arg(long, env = "CHAT_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// YAML file with the security key and OAuth credentials.
    #[arg(long, env = "CHAT_SECRETS", default_value = "secrets.yaml")]
    pub secrets: PathBuf,

    /// Where browsers reach us; OAuth callbacks are built from it.
    #[arg(long, env = "CHAT_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: String,

    #[arg(long, env = "CHAT_AVATARS_DIR", default_value = "avatars")]
    pub avatars_dir: PathBuf,

    /// Messages a client may have queued before it is dropped as unresponsive.
    #[arg(long, env = "CHAT_MAILBOX_CAPACITY", default_value = "256")]
    pub mailbox_capacity: NonZeroUsize,

    #[arg(
        long,
        env = "CHAT_KEEPALIVE_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub keepalive_secs: u64,
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            mailbox_capacity: self.mailbox_capacity,
            keepalive: Duration::from_secs(self.keepalive_secs),
        }
    }

    pub fn redirect_url(&self, provider: Provider) -> String {
        format!(
            "{}/auth/callback/{}",
            self.public_url.trim_end_matches('/'),
            provider.slug()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Secrets {
    pub security_key: String,
    google: Credentials,
    facebook: Credentials,
    github: Credentials,
}

#[derive(Deserialize)]
struct RawSecrets {
    #[serde(default)]
    security_key: String,
    #[serde(default)]
    google: HashMap<String, String>,
    #[serde(default)]
    facebook: HashMap<String, String>,
    #[serde(default)]
    github: HashMap<String, String>,
}

impl Secrets {
    pub fn load(path: &Path) -> Result<Secrets, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Secrets::parse(&yaml)
    }

    pub fn parse(yaml: &str) -> Result<Secrets, ConfigError> {
        let raw: RawSecrets = serde_yaml::from_str(yaml)?;

        if raw.security_key.trim().is_empty() {
            return Err(ConfigError::SecurityKey);
        }

        Ok(Secrets {
            security_key: raw.security_key,
            google: credentials(Provider::Google, &raw.google)?,
            facebook: credentials(Provider::Facebook, &raw.facebook)?,
            github: credentials(Provider::Github, &raw.github)?,
        })
    }

    pub fn credentials(&self, provider: Provider) -> &Credentials {
        use Provider::*;
        match provider {
            Google => &self.google,
            Facebook => &self.facebook,
            Github => &self.github,
        }
    }
}

fn credentials(provider: Provider, map: &HashMap<String, String>) -> Result<Credentials, ConfigError> {
    let field = |field: &'static str| {
        map.get(field)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or(ConfigError::Credentials { provider, field })
    };

    Ok(Credentials {
        client_id: field("clientid")?,
        client_secret: field("clientsecret")?,
    })
}

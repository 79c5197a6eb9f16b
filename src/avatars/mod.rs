//! Avatar URL resolution.
//!
//! Each [`Avatar`] knows one way of finding a picture for a user. They are
//! tried in order by [`TryAvatars`]; the first one that has an answer wins.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

use crate::session::{ChatUser, email_hash};

mod upload;

pub(crate) use upload::uploader;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvatarError {
    #[error("unable to get an avatar URL")]
    NotFound,
    #[error("avatar lookup was cancelled")]
    Cancelled,
}

pub trait Avatar {
    fn avatar_url(&self, user: &ChatUser) -> Result<String, AvatarError>;
}

/// A picture the user uploaded, stored as `<dir>/<unique id>.<ext>`.
pub struct FileSystemAvatar {
    dir: PathBuf,
}

impl FileSystemAvatar {
    pub fn new(dir: impl Into<PathBuf>) -> FileSystemAvatar {
        FileSystemAvatar { dir: dir.into() }
    }
}

impl Avatar for FileSystemAvatar {
    fn avatar_url(&self, user: &ChatUser) -> Result<String, AvatarError> {
        let entries = fs::read_dir(&self.dir).map_err(|_| AvatarError::NotFound)?;

        entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .find(|name| {
                Path::new(name)
                    .file_stem()
                    .is_some_and(|stem| stem == OsStr::new(&user.unique_id))
            })
            .map(|name| format!("/avatars/{name}"))
            .ok_or(AvatarError::NotFound)
    }
}

/// The picture the identity provider gave us.
pub struct AuthAvatar;

impl Avatar for AuthAvatar {
    fn avatar_url(&self, user: &ChatUser) -> Result<String, AvatarError> {
        user.picture.clone().ok_or(AvatarError::NotFound)
    }
}

pub struct GravatarAvatar;

impl Avatar for GravatarAvatar {
    fn avatar_url(&self, user: &ChatUser) -> Result<String, AvatarError> {
        let email = user.email.as_deref().ok_or(AvatarError::NotFound)?;
        Ok(format!("https://www.gravatar.com/avatar/{}", email_hash(email)))
    }
}

pub struct TryAvatars(Vec<Box<dyn Avatar + Send + Sync>>);

impl TryAvatars {
    pub fn new(avatars: Vec<Box<dyn Avatar + Send + Sync>>) -> TryAvatars {
        TryAvatars(avatars)
    }

    /// Uploaded file, then the provider's picture, then Gravatar.
    pub fn standard(avatars_dir: &Path) -> TryAvatars {
        TryAvatars::new(vec![
            Box::new(FileSystemAvatar::new(avatars_dir)),
            Box::new(AuthAvatar),
            Box::new(GravatarAvatar),
        ])
    }
}

impl Avatar for TryAvatars {
    fn avatar_url(&self, user: &ChatUser) -> Result<String, AvatarError> {
        self.0
            .iter()
            .find_map(|avatar| avatar.avatar_url(user).ok())
            .ok_or(AvatarError::NotFound)
    }
}

/// Looks up `user`'s avatar on the blocking pool. Checking for an uploaded
/// file reads the avatars directory, which must not stall a runtime worker.
pub async fn resolve(avatars: Arc<TryAvatars>, user: ChatUser) -> Result<String, AvatarError> {
    tokio::task::spawn_blocking(move || avatars.avatar_url(&user))
        .await
        .map_err(|_| AvatarError::Cancelled)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Provider;

    fn user(email: Option<&str>, picture: Option<&str>) -> ChatUser {
        ChatUser::new(
            Provider::Google,
            "1",
            "Ada".to_owned(),
            email.map(str::to_owned),
            picture.map(str::to_owned),
        )
    }

    #[test]
    fn uploaded_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let ada = user(Some("ada@example.com"), Some("https://provider/ada.png"));
        fs::write(dir.path().join("someone-else.png"), b"x").unwrap();
        fs::write(dir.path().join(format!("{}.jpg", ada.unique_id)), b"x").unwrap();

        let avatars = TryAvatars::standard(dir.path());

        assert_eq!(
            avatars.avatar_url(&ada).unwrap(),
            format!("/avatars/{}.jpg", ada.unique_id)
        );
    }

    #[test]
    fn provider_picture_before_gravatar() {
        let dir = tempfile::tempdir().unwrap();
        let ada = user(Some("ada@example.com"), Some("https://provider/ada.png"));

        assert_eq!(
            TryAvatars::standard(dir.path()).avatar_url(&ada).unwrap(),
            "https://provider/ada.png"
        );
    }

    #[test]
    fn gravatar_from_email() {
        let ada = user(Some("ada@example.com"), None);

        assert_eq!(
            TryAvatars::standard(Path::new("/nonexistent")).avatar_url(&ada).unwrap(),
            format!("https://www.gravatar.com/avatar/{}", email_hash("ada@example.com"))
        );
    }

    #[test]
    fn nothing_left_to_try() {
        let nobody = user(None, None);

        assert_eq!(
            TryAvatars::standard(Path::new("/nonexistent")).avatar_url(&nobody),
            Err(AvatarError::NotFound)
        );
        assert_eq!(TryAvatars::new(vec![]).avatar_url(&nobody), Err(AvatarError::NotFound));
    }

    #[tokio::test]
    async fn resolve_reads_uploads_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let ada = user(None, Some("https://provider/ada.png"));
        let avatars = Arc::new(TryAvatars::standard(dir.path()));

        assert_eq!(
            resolve(avatars.clone(), ada.clone()).await.unwrap(),
            "https://provider/ada.png"
        );

        tokio::fs::write(dir.path().join(format!("{}.gif", ada.unique_id)), b"x")
            .await
            .unwrap();
        assert_eq!(
            resolve(avatars, ada.clone()).await.unwrap(),
            format!("/avatars/{}.gif", ada.unique_id)
        );
    }
}

use std::{ffi::OsStr, path::Path, sync::Arc};

use axum::{
    Extension, debug_handler,
    extract::{Multipart, State},
    response::Redirect,
};
use tokio::fs;
use tracing::info;

use crate::{AppResult, AppState, config::Settings, session::ChatUser};

const FIELD: &str = "avatarFile";

/// Stores an uploaded picture as the user's avatar. It is picked up the next
/// time the user connects to the room.
#[debug_handler(state = AppState)]
pub(crate) async fn uploader(
    State(settings): State<Arc<Settings>>,
    Extension(user): Extension<ChatUser>,
    mut multipart: Multipart,
) -> AppResult<Redirect> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FIELD) {
            continue;
        }

        let extension = field.file_name().map(extension_of).unwrap_or_default();
        let data = field.bytes().await?;

        let dir = &settings.avatars_dir;
        fs::create_dir_all(dir).await?;
        remove_previous(dir, &user.unique_id).await?;

        let file_name = format!("{}{extension}", user.unique_id);
        fs::write(dir.join(&file_name), &data).await?;

        info!(user = %user.unique_id, file = %file_name, bytes = data.len(), "avatar uploaded");
        return Ok(Redirect::to("/chat"));
    }

    Err(format!("upload without {FIELD}").into())
}

/// `.png` for `me.PNG`; nothing for names without a plain alphanumeric
/// extension.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

async fn remove_previous(dir: &Path, unique_id: &str) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem().is_some_and(|stem| stem == OsStr::new(unique_id)) {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(extension_of("me.PNG"), ".png");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("../../evil.p/ng"), "");
    }

    #[tokio::test]
    async fn previous_upload_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc.png"), b"old").await.unwrap();
        fs::write(dir.path().join("abcd.png"), b"other user").await.unwrap();

        remove_previous(dir.path(), "abc").await.unwrap();

        assert!(!dir.path().join("abc.png").exists());
        assert!(dir.path().join("abcd.png").exists());
    }
}

use super::*;
use crate::identity::types::{AppMetadata, User, UserMetadata};

fn sample_session() -> Session {
    Session {
        access_token: "AAA".into(),
        refresh_token: "BBB".into(),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: Some(1_700_000_000),
        user: User {
            id: "u1".into(),
            email: Some("ada@example.com".into()),
            app_metadata: AppMetadata { provider: Some("github".into()) },
            user_metadata: UserMetadata::default(),
        },
    }
}

#[tokio::test]
async fn load_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let file = SessionFile::new(dir.path().join("session.json"));
    assert!(file.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_returns_session() {
    let dir = tempfile::tempdir().unwrap();
    let file = SessionFile::new(dir.path().join("nested").join("session.json"));
    file.save(&sample_session()).await.unwrap();
    assert_eq!(file.load().await.unwrap(), Some(sample_session()));
}

#[tokio::test]
async fn corrupt_file_is_treated_as_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    tokio::fs::write(&path, b"{not json").await.unwrap();
    let file = SessionFile::new(&path);
    assert!(file.load().await.unwrap().is_none());
}

#[tokio::test]
async fn clear_removes_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&sample_session()).await.unwrap();
    file.clear().await.unwrap();
    assert!(file.load().await.unwrap().is_none());
    file.clear().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn saved_file_is_private_to_owner() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    // A pre-existing world-readable file must not keep its mode.
    tokio::fs::write(&path, b"{}").await.unwrap();
    tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await.unwrap();

    let file = SessionFile::new(&path);
    file.save(&sample_session()).await.unwrap();

    let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0, "session file mode {:o}", mode & 0o777);
    assert_eq!(file.load().await.unwrap(), Some(sample_session()));
}

#[tokio::test]
async fn save_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&sample_session()).await.unwrap();
    file.save(&sample_session()).await.unwrap();

    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert_eq!(names, ["session.json"]);
}

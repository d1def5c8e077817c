//! DeltaRepository integration tests — uniqueness, revocation, chirps, lifecycle

#![cfg(feature = "delta")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use chirpy_core::repo::{ChirpStore, CredentialStore, DeltaRepository};
use chirpy_core::types::RefreshTokenRecord;
use chirpy_core::{AuthConfig, AuthError, Credentials, DeltaStore, SessionService};

async fn open(dir: &TempDir) -> DeltaRepository {
    DeltaRepository::open(dir.path()).await.unwrap()
}

#[tokio::test]
async fn test_tables_created_once() {
    let dir = TempDir::new().unwrap();
    let first = open(&dir).await;
    first.close().await.unwrap();

    // re-opening an existing layout must not fail or wipe data
    let second = open(&dir).await;
    assert!(second.list_chirps(None).await.unwrap().is_empty());
    for table in ["users", "refresh_tokens", "chirps"] {
        assert!(dir.path().join(table).join("_delta_log").exists());
    }
}

#[tokio::test]
async fn test_create_and_lookup_user() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;

    let user = repo.create_user("a@b.com", "hash-1").await.unwrap();
    assert!(!user.is_chirpy_red);

    let by_email = repo.get_user_by_email("a@b.com").await.unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.hashed_password, "hash-1");

    let by_id = repo.get_user_by_id(user.id).await.unwrap();
    assert_eq!(by_id.email, "a@b.com");

    assert!(matches!(
        repo.get_user_by_email("missing@b.com").await,
        Err(AuthError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_email_under_concurrency() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(open(&dir).await);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.create_user("race@b.com", "hash").await
        }));
    }

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::DuplicateEmail(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(duplicates, 3);
}

#[tokio::test]
async fn test_email_with_quote() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;

    let user = repo.create_user("o'hara@b.com", "hash").await.unwrap();
    assert_eq!(repo.get_user_by_email("o'hara@b.com").await.unwrap().id, user.id);
}

#[tokio::test]
async fn test_update_and_upgrade() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;

    let user = repo.create_user("a@b.com", "h1").await.unwrap();
    repo.create_user("taken@b.com", "h").await.unwrap();

    assert!(matches!(
        repo.update_user_credentials(user.id, "taken@b.com", "h2").await,
        Err(AuthError::DuplicateEmail(_))
    ));

    let updated = repo
        .update_user_credentials(user.id, "new@b.com", "h2")
        .await
        .unwrap();
    assert_eq!(updated.email, "new@b.com");
    assert_eq!(updated.created_at, user.created_at);

    repo.set_upgrade_flag(user.id).await.unwrap();
    let reloaded = repo.get_user_by_id(user.id).await.unwrap();
    assert!(reloaded.is_chirpy_red);
    assert_eq!(reloaded.hashed_password, "h2");

    assert!(matches!(
        repo.set_upgrade_flag(Uuid::new_v4()).await,
        Err(AuthError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_refresh_token_lifecycle() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;
    let user = repo.create_user("a@b.com", "h").await.unwrap();

    let now = Utc::now();
    repo.create_refresh_token(RefreshTokenRecord::new(
        "live".into(),
        user.id,
        now,
        now + Duration::days(60),
    ))
    .await
    .unwrap();
    repo.create_refresh_token(RefreshTokenRecord::new(
        "stale".into(),
        user.id,
        now - Duration::days(61),
        now - Duration::days(1),
    ))
    .await
    .unwrap();

    assert_eq!(
        repo.get_user_by_valid_refresh_token("live", Utc::now())
            .await
            .unwrap()
            .id,
        user.id
    );
    assert!(matches!(
        repo.get_user_by_valid_refresh_token("stale", Utc::now()).await,
        Err(AuthError::RefreshTokenExpired)
    ));
    assert!(matches!(
        repo.get_user_by_valid_refresh_token("nope", Utc::now()).await,
        Err(AuthError::RefreshTokenNotFound)
    ));

    // read-after-write: the next lookup observes the revoke
    repo.revoke_refresh_token("live", Utc::now()).await.unwrap();
    assert!(matches!(
        repo.get_user_by_valid_refresh_token("live", Utc::now()).await,
        Err(AuthError::RefreshTokenRevoked)
    ));
    assert!(matches!(
        repo.revoke_refresh_token("live", Utc::now()).await,
        Err(AuthError::RefreshTokenRevoked)
    ));
    assert!(matches!(
        repo.revoke_refresh_token("nope", Utc::now()).await,
        Err(AuthError::RefreshTokenNotFound)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_user_stays_visible_during_updates() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(open(&dir).await);
    let user = repo.create_user("a@b.com", "h0").await.unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let mut misses = 0;
            while !done.load(Ordering::Acquire) {
                match repo.get_user_by_email("a@b.com").await {
                    Ok(found) => assert_eq!(found.id, user.id),
                    Err(AuthError::UserNotFound(_)) => misses += 1,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            misses
        }));
    }

    for i in 0..20 {
        repo.update_user_credentials(user.id, "a@b.com", &format!("h{i}"))
            .await
            .unwrap();
        if i == 10 {
            repo.set_upgrade_flag(user.id).await.unwrap();
        }
    }
    done.store(true, Ordering::Release);

    let mut misses = 0;
    for reader in readers {
        misses += reader.await.unwrap();
    }
    assert_eq!(misses, 0);

    let reloaded = repo.get_user_by_id(user.id).await.unwrap();
    assert_eq!(reloaded.hashed_password, "h19");
    assert!(reloaded.is_chirpy_red);
    assert_eq!(reloaded.created_at, user.created_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_token_stays_visible_during_revoke() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(open(&dir).await);
    let user = repo.create_user("a@b.com", "h").await.unwrap();
    let now = Utc::now();
    repo.create_refresh_token(RefreshTokenRecord::new(
        "live".into(),
        user.id,
        now,
        now + Duration::days(60),
    ))
    .await
    .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let repo = Arc::clone(&repo);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            while !done.load(Ordering::Acquire) {
                match repo.get_user_by_valid_refresh_token("live", Utc::now()).await {
                    Ok(_) | Err(AuthError::RefreshTokenRevoked) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    repo.revoke_refresh_token("live", Utc::now()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.await.unwrap();
    }

    assert!(matches!(
        repo.get_user_by_valid_refresh_token("live", Utc::now()).await,
        Err(AuthError::RefreshTokenRevoked)
    ));
}

#[tokio::test]
async fn test_each_update_is_one_commit() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DeltaStore::new(dir.path()).await.unwrap());
    let repo = DeltaRepository::with_store(Arc::clone(&store));

    let start = store.version("users").await.unwrap();
    let user = repo.create_user("a@b.com", "h1").await.unwrap();
    assert_eq!(store.version("users").await.unwrap(), start + 1);

    repo.update_user_credentials(user.id, "c@d.com", "h2").await.unwrap();
    assert_eq!(store.version("users").await.unwrap(), start + 2);

    repo.set_upgrade_flag(user.id).await.unwrap();
    assert_eq!(store.version("users").await.unwrap(), start + 3);

    // already upgraded: no new commit
    repo.set_upgrade_flag(user.id).await.unwrap();
    assert_eq!(store.version("users").await.unwrap(), start + 3);
}

#[tokio::test]
async fn test_chirps() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;
    let alice = repo.create_user("alice@b.com", "h").await.unwrap();
    let bob = repo.create_user("bob@b.com", "h").await.unwrap();

    let first = repo.create_chirp("first", alice.id).await.unwrap();
    repo.create_chirp("second", bob.id).await.unwrap();
    repo.create_chirp("third", alice.id).await.unwrap();

    let all: Vec<String> = repo
        .list_chirps(None)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.body)
        .collect();
    assert_eq!(all, ["first", "second", "third"]);

    let mine = repo.list_chirps(Some(alice.id)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|c| c.user_id == alice.id));

    assert_eq!(repo.get_chirp(first.id).await.unwrap().body, "first");
    repo.delete_chirp(first.id).await.unwrap();
    assert!(matches!(
        repo.get_chirp(first.id).await,
        Err(AuthError::ChirpNotFound(_))
    ));
    assert!(matches!(
        repo.delete_chirp(first.id).await,
        Err(AuthError::ChirpNotFound(_))
    ));
}

#[tokio::test]
async fn test_reset_wipes_everything() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;
    let user = repo.create_user("a@b.com", "h").await.unwrap();
    repo.create_chirp("hello", user.id).await.unwrap();

    repo.reset().await.unwrap();
    assert!(repo.get_user_by_id(user.id).await.is_err());
    assert!(repo.list_chirps(None).await.unwrap().is_empty());
    // email is free again
    repo.create_user("a@b.com", "h").await.unwrap();
}

#[tokio::test]
async fn test_closed_repository_rejects_calls() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;
    repo.close().await.unwrap();
    repo.close().await.unwrap();

    assert!(matches!(
        repo.create_user("a@b.com", "h").await,
        Err(AuthError::Persistence(_))
    ));
    assert!(matches!(
        repo.get_user_by_email("a@b.com").await,
        Err(AuthError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_session_flow_over_delta() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(open(&dir).await);
    let service = SessionService::new(
        repo.clone(),
        Arc::new(AuthConfig::new("delta-flow-secret").with_data_dir(dir.path())),
    );

    let grant = service
        .signup(Credentials::new("a@b.com", "pw123456"))
        .await
        .unwrap();
    let login = service
        .login(Credentials::new("a@b.com", "pw123456"))
        .await
        .unwrap();
    assert_eq!(login.user.id, grant.user.id);

    service.refresh(&login.tokens.refresh_token).await.unwrap();
    service.revoke(&login.tokens.refresh_token).await.unwrap();
    assert!(matches!(
        service.refresh(&login.tokens.refresh_token).await,
        Err(AuthError::RefreshTokenRevoked)
    ));
    assert!(service.refresh(&grant.tokens.refresh_token).await.is_ok());
}

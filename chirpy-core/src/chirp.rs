//! Chirp posting rules and the service protected chirp routes call into

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::repo::ChirpStore;
use crate::types::Chirp;

/// Longest accepted chirp body, in characters
pub const MAX_CHIRP_LEN: usize = 140;

const BANNED_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];
const MASK: &str = "****";

/// Mask banned words. Words are split on whitespace, matched
/// case-insensitively as whole words and re-joined with single spaces.
pub fn clean_body(body: &str) -> String {
    body.split_whitespace()
        .map(|word| {
            let lowered = word.to_lowercase();
            if BANNED_WORDS.contains(&lowered.as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Listing order by creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(AuthError::MalformedRequest(format!("Invalid sort order: {other}"))),
        }
    }
}

#[derive(Clone)]
pub struct ChirpService {
    store: Arc<dyn ChirpStore>,
}

impl ChirpService {
    pub fn new(store: Arc<dyn ChirpStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, author: Uuid, body: &str) -> Result<Chirp> {
        if body.chars().count() > MAX_CHIRP_LEN {
            return Err(AuthError::MalformedRequest("Chirp is too long".into()));
        }
        let chirp = self.store.create_chirp(&clean_body(body), author).await?;
        info!(chirp_id = %chirp.id, user_id = %author, "Chirp created");
        Ok(chirp)
    }

    pub async fn list(&self, author: Option<Uuid>, order: SortOrder) -> Result<Vec<Chirp>> {
        let mut chirps = self.store.list_chirps(author).await?;
        if order == SortOrder::Desc {
            chirps.reverse();
        }
        Ok(chirps)
    }

    pub async fn get(&self, id: Uuid) -> Result<Chirp> {
        self.store.get_chirp(id).await
    }

    /// Only the author may delete a chirp
    pub async fn delete(&self, requester: Uuid, id: Uuid) -> Result<()> {
        let chirp = self.store.get_chirp(id).await?;
        if chirp.user_id != requester {
            warn!(chirp_id = %id, user_id = %requester, "Delete refused: not the author");
            return Err(AuthError::Forbidden("not the author of this chirp".into()));
        }
        self.store.delete_chirp(id).await?;
        info!(chirp_id = %id, "Chirp deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{CredentialStore, MemoryRepository};

    #[test]
    fn test_clean_body() {
        assert_eq!(
            clean_body("This contains kerfuffle and sharbert words"),
            "This contains **** and **** words"
        );
        assert_eq!(clean_body("FORNAX Kerfuffle"), "**** ****");
        // punctuation makes it a different word
        assert_eq!(clean_body("Sharbert! is fine"), "Sharbert! is fine");
        assert_eq!(clean_body("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_sort_order() {
        assert_eq!("".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[tokio::test]
    async fn test_length_limit() {
        let repo = Arc::new(MemoryRepository::new());
        let user = repo.create_user("a@b.com", "h").await.unwrap();
        let chirps = ChirpService::new(repo);

        assert!(chirps.create(user.id, &"a".repeat(MAX_CHIRP_LEN)).await.is_ok());
        let err = chirps
            .create(user.id, &"a".repeat(MAX_CHIRP_LEN + 1))
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "Chirp is too long");
    }

    #[tokio::test]
    async fn test_only_author_deletes() {
        let repo = Arc::new(MemoryRepository::new());
        let alice = repo.create_user("alice@b.com", "h").await.unwrap();
        let bob = repo.create_user("bob@b.com", "h").await.unwrap();
        let chirps = ChirpService::new(repo);

        let chirp = chirps.create(alice.id, "hello").await.unwrap();
        assert!(matches!(
            chirps.delete(bob.id, chirp.id).await,
            Err(AuthError::Forbidden(_))
        ));
        chirps.delete(alice.id, chirp.id).await.unwrap();
        assert!(matches!(
            chirps.get(chirp.id).await,
            Err(AuthError::ChirpNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_order_and_filter() {
        let repo = Arc::new(MemoryRepository::new());
        let alice = repo.create_user("alice@b.com", "h").await.unwrap();
        let bob = repo.create_user("bob@b.com", "h").await.unwrap();
        let chirps = ChirpService::new(repo);

        chirps.create(alice.id, "first").await.unwrap();
        chirps.create(bob.id, "second").await.unwrap();
        chirps.create(alice.id, "third").await.unwrap();

        let asc: Vec<String> = chirps
            .list(None, SortOrder::Asc)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(asc, ["first", "second", "third"]);

        let alice_desc: Vec<String> = chirps
            .list(Some(alice.id), SortOrder::Desc)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(alice_desc, ["third", "first"]);
    }
}

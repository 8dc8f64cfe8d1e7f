//! Token authority: issues, validates, extends and revokes bearer tokens,
//! and owns the keyed password hash every credential check goes through.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{Error, Result};
use crate::store::records::{Token, User, now_ms, random_id};
use crate::store::{RecordStore, TOKENS, USERS};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_ID_LEN: usize = 20;

pub struct TokenAuthority {
    store: Arc<dyn RecordStore>,
    hashing_secret: String,
    token_ttl_ms: i64,
}

impl TokenAuthority {
    pub fn new(
        store: Arc<dyn RecordStore>,
        hashing_secret: impl Into<String>,
        token_ttl_ms: i64,
    ) -> Self {
        Self { store, hashing_secret: hashing_secret.into(), token_ttl_ms }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.hashing_secret.as_bytes())
            .expect("HMAC accepts keys of any length")
    }

    /// Keyed one-way hash of a password, hex encoded.
    pub fn hash_password(&self, password: &str) -> String {
        let mut mac = self.mac();
        mac.update(password.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison against a stored hash.
    fn verify_password(&self, password: &str, stored_hex: &str) -> bool {
        let Ok(stored) = hex::decode(stored_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(password.as_bytes());
        mac.verify_slice(&stored).is_ok()
    }

    /// Mint a token for a user after checking their password.
    pub async fn issue(&self, phone: &str, password: &str) -> Result<Token> {
        let user: User = serde_json::from_value(self.store.read(USERS, phone).await?)?;
        if !self.verify_password(password, &user.hashed_password) {
            return Err(Error::InvalidCredential);
        }

        let token = Token {
            id: random_id(TOKEN_ID_LEN),
            phone: phone.to_string(),
            expires: now_ms() + self.token_ttl_ms,
        };
        self.store.create(TOKENS, &token.id, serde_json::to_value(&token)?).await?;
        Ok(token)
    }

    /// True only if the token exists, belongs to the phone and is unexpired.
    /// Lookup failures collapse to false; this never errors at the caller.
    pub async fn validate(&self, token_id: &str, phone: &str) -> bool {
        match self.store.read(TOKENS, token_id).await {
            Ok(raw) => match serde_json::from_value::<Token>(raw) {
                Ok(token) => token.phone == phone && token.expires > now_ms(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Push the expiry of a live token one TTL into the future.
    pub async fn extend(&self, token_id: &str) -> Result<()> {
        let token: Token = serde_json::from_value(self.store.read(TOKENS, token_id).await?)?;
        if token.expires <= now_ms() {
            return Err(Error::Expired);
        }

        let expires = now_ms() + self.token_ttl_ms;
        self.store.update(TOKENS, token_id, serde_json::json!({ "expires": expires })).await
    }

    pub async fn revoke(&self, token_id: &str) -> Result<()> {
        self.store.delete(TOKENS, token_id).await
    }

    /// Delete every token whose expiry has passed. Item failures are logged
    /// and skipped; they never stop the sweep.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let mut deleted = 0;
        for id in self.store.list(TOKENS).await? {
            let token: Token = match self
                .store
                .read(TOKENS, &id)
                .await
                .and_then(|raw| Ok(serde_json::from_value(raw)?))
            {
                Ok(token) => token,
                Err(err) => {
                    warn!(token = %id, "skipping unreadable token: {err}");
                    continue;
                }
            };

            if token.expires < now_ms() {
                match self.store.delete(TOKENS, &id).await {
                    Ok(()) => deleted += 1,
                    Err(err) => warn!(token = %id, "failed to delete expired token: {err}"),
                }
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::FileStore;

    const PHONE: &str = "01234567890";
    const PASSWORD: &str = "hunter2hunter2";

    async fn authority_with_user() -> (tempfile::TempDir, Arc<dyn RecordStore>, TokenAuthority) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let auth = TokenAuthority::new(store.clone(), "test-secret", 3_600_000);

        let user = User {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: PHONE.into(),
            hashed_password: auth.hash_password(PASSWORD),
            tos_agreement: true,
            checks: Vec::new(),
        };
        store.create(USERS, PHONE, serde_json::to_value(&user).unwrap()).await.unwrap();

        (dir, store, auth)
    }

    #[test]
    fn hashing_is_deterministic_and_key_dependent() {
        let store: Arc<dyn RecordStore> = Arc::new(NullStore);
        let a = TokenAuthority::new(store.clone(), "secret-a", 0);
        let b = TokenAuthority::new(store, "secret-b", 0);

        assert_eq!(a.hash_password("pw"), a.hash_password("pw"));
        assert_ne!(a.hash_password("pw"), b.hash_password("pw"));
        assert!(a.verify_password("pw", &a.hash_password("pw")));
        assert!(!a.verify_password("pw", &b.hash_password("pw")));
        assert!(!a.verify_password("pw", "not-hex"));
    }

    /// Store stub for tests that never touch persistence.
    struct NullStore;

    #[async_trait::async_trait]
    impl RecordStore for NullStore {
        async fn create(&self, _: &str, _: &str, _: serde_json::Value) -> crate::error::Result<()> {
            Ok(())
        }
        async fn read(&self, _: &str, _: &str) -> crate::error::Result<serde_json::Value> {
            Err(Error::NotFound)
        }
        async fn update(&self, _: &str, _: &str, _: serde_json::Value) -> crate::error::Result<()> {
            Err(Error::NotFound)
        }
        async fn delete(&self, _: &str, _: &str) -> crate::error::Result<()> {
            Err(Error::NotFound)
        }
        async fn list(&self, _: &str) -> crate::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn issue_mints_a_valid_one_hour_token() {
        let (_dir, _store, auth) = authority_with_user().await;

        let token = auth.issue(PHONE, PASSWORD).await.unwrap();
        assert_eq!(token.id.len(), TOKEN_ID_LEN);
        assert!(token.expires > now_ms());
        assert!(auth.validate(&token.id, PHONE).await);
    }

    #[tokio::test]
    async fn issue_rejects_wrong_password_and_unknown_user() {
        let (_dir, _store, auth) = authority_with_user().await;

        let err = auth.issue(PHONE, "wrong-password").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredential));

        let err = auth.issue("09999999999", PASSWORD).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn validate_rejects_mismatched_phone_and_forced_expiry() {
        let (_dir, store, auth) = authority_with_user().await;
        let token = auth.issue(PHONE, PASSWORD).await.unwrap();

        assert!(auth.validate(&token.id, PHONE).await);
        assert!(!auth.validate(&token.id, "09999999999").await);
        assert!(!auth.validate("aaaaaaaaaaaaaaaaaaaa", PHONE).await);

        store
            .update(TOKENS, &token.id, json!({ "expires": now_ms() - 1 }))
            .await
            .unwrap();
        assert!(!auth.validate(&token.id, PHONE).await);
    }

    #[tokio::test]
    async fn extend_strictly_increases_expiry_of_a_live_token() {
        let (_dir, store, auth) = authority_with_user().await;
        let token = auth.issue(PHONE, PASSWORD).await.unwrap();

        // Pull the expiry back so the extension is observably larger.
        let short = now_ms() + 1_000;
        store.update(TOKENS, &token.id, json!({ "expires": short })).await.unwrap();

        auth.extend(&token.id).await.unwrap();
        let stored: Token =
            serde_json::from_value(store.read(TOKENS, &token.id).await.unwrap()).unwrap();
        assert!(stored.expires > short);
    }

    #[tokio::test]
    async fn extend_on_expired_token_fails_without_mutation() {
        let (_dir, store, auth) = authority_with_user().await;
        let token = auth.issue(PHONE, PASSWORD).await.unwrap();

        let expired = now_ms() - 1;
        store.update(TOKENS, &token.id, json!({ "expires": expired })).await.unwrap();

        let err = auth.extend(&token.id).await.unwrap_err();
        assert!(matches!(err, Error::Expired));

        let stored: Token =
            serde_json::from_value(store.read(TOKENS, &token.id).await.unwrap()).unwrap();
        assert_eq!(stored.expires, expired);
    }

    #[tokio::test]
    async fn revoke_deletes_and_reports_missing_tokens() {
        let (_dir, _store, auth) = authority_with_user().await;
        let token = auth.issue(PHONE, PASSWORD).await.unwrap();

        auth.revoke(&token.id).await.unwrap();
        assert!(!auth.validate(&token.id, PHONE).await);
        assert!(matches!(auth.revoke(&token.id).await.unwrap_err(), Error::NotFound));
    }

    #[tokio::test]
    async fn sweep_deletes_exactly_the_expired_tokens() {
        let (_dir, store, auth) = authority_with_user().await;

        let live_a = auth.issue(PHONE, PASSWORD).await.unwrap();
        let live_b = auth.issue(PHONE, PASSWORD).await.unwrap();
        let dead = auth.issue(PHONE, PASSWORD).await.unwrap();
        store.update(TOKENS, &dead.id, json!({ "expires": now_ms() - 1 })).await.unwrap();

        assert_eq!(auth.sweep_expired().await.unwrap(), 1);

        let remaining = store.list(TOKENS).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&live_a.id));
        assert!(remaining.contains(&live_b.id));
    }
}

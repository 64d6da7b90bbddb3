//! Persistent Credential Store
//!
//! Write-through persistence for the session: the access token, the refresh
//! token and the cached user profile each live under their own key in the
//! host's [`SecureStore`], mirroring the browser client's local storage
//! layout so the same key names are used on every host.
//!
//! Token values are never logged.

use crate::error::{AuthError, Result};
use crate::types::{Session, UserProfile};
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ACCESS_TOKEN_KEY: &str = "quiz_master_token";
pub const REFRESH_TOKEN_KEY: &str = "quiz_master_refresh_token";
pub const USER_KEY: &str = "quiz_master_user";

/// Typed facade over the three persisted session keys.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Reads the persisted session.
    ///
    /// A cached profile that no longer deserializes is deleted and treated
    /// as absent; the tokens are still returned.
    pub async fn load(&self) -> Result<Session> {
        let access_token = self.read_string(ACCESS_TOKEN_KEY).await?;
        let refresh_token = self.read_string(REFRESH_TOKEN_KEY).await?;
        let user = self.read_user().await?;

        debug!(
            has_access_token = access_token.is_some(),
            has_refresh_token = refresh_token.is_some(),
            has_user = user.is_some(),
            "Loaded persisted session"
        );

        Ok(Session {
            access_token: access_token.unwrap_or_default(),
            refresh_token: refresh_token.unwrap_or_default(),
            user,
        })
    }

    /// Persists every field of `session`. Empty tokens and a missing user
    /// delete the corresponding key.
    pub async fn save(&self, session: &Session) -> Result<()> {
        self.save_access_token(&session.access_token).await?;
        self.save_refresh_token(&session.refresh_token).await?;
        match &session.user {
            Some(user) => self.save_user(user).await,
            None => self.delete(USER_KEY).await,
        }
    }

    pub async fn save_access_token(&self, token: &str) -> Result<()> {
        self.write_string(ACCESS_TOKEN_KEY, token).await
    }

    pub async fn save_refresh_token(&self, token: &str) -> Result<()> {
        self.write_string(REFRESH_TOKEN_KEY, token).await
    }

    pub async fn save_user(&self, user: &UserProfile) -> Result<()> {
        let json = serde_json::to_vec(user).map_err(|e| {
            warn!(error = %e, "Failed to serialize user profile");
            AuthError::Storage(format!("user profile serialization failed: {}", e))
        })?;

        self.secure_store
            .set_secret(USER_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist user profile");
                AuthError::Storage(e.to_string())
            })
    }

    /// Removes all persisted session keys.
    ///
    /// Every key is attempted even when an earlier delete fails; the first
    /// failure is returned.
    pub async fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.delete(key).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Cleared persisted session");
                Ok(())
            }
        }
    }

    async fn read_string(&self, key: &str) -> Result<Option<String>> {
        let bytes = self
            .secure_store
            .get_secret(key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        match bytes {
            None => Ok(None),
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(value) if value.is_empty() => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    warn!(key = key, "Persisted credential is not UTF-8; discarding");
                    self.delete(key).await?;
                    Ok(None)
                }
            },
        }
    }

    async fn read_user(&self) -> Result<Option<UserProfile>> {
        let bytes = self
            .secure_store
            .get_secret(USER_KEY)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        match serde_json::from_slice::<Option<UserProfile>>(&bytes) {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "Cached user profile is corrupted; discarding");
                self.delete(USER_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn write_string(&self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.delete(key).await;
        }

        self.secure_store
            .set_secret(key, value.as_bytes())
            .await
            .map_err(|e| {
                warn!(key = key, error = %e, "Failed to persist credential");
                AuthError::Storage(e.to_string())
            })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.secure_store.delete_secret(key).await.map_err(|e| {
            warn!(key = key, error = %e, "Failed to delete credential");
            AuthError::Storage(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use async_trait::async_trait;
    use bridge_desktop::MemorySecureStore;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};

    fn sample_session() -> Session {
        Session {
            access_token: "T1".to_string(),
            refresh_token: "R1".to_string(),
            user: Some(UserProfile {
                id: Some(1),
                email: Some("a@b.com".to_string()),
                role: Role::Admin,
                ..UserProfile::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let backing = MemorySecureStore::new();
        let store = CredentialStore::new(Arc::new(backing.clone()));

        store.save(&sample_session()).await.unwrap();

        let reopened = CredentialStore::new(Arc::new(backing));
        assert_eq!(reopened.load().await.unwrap(), sample_session());
    }

    #[tokio::test]
    async fn test_uses_browser_key_names() {
        let backing = MemorySecureStore::new();
        let store = CredentialStore::new(Arc::new(backing.clone()));

        store.save(&sample_session()).await.unwrap();

        assert_eq!(
            backing.list_keys().await.unwrap(),
            vec!["quiz_master_refresh_token", "quiz_master_token", "quiz_master_user"]
        );
        assert_eq!(
            backing.get_secret(ACCESS_TOKEN_KEY).await.unwrap(),
            Some(b"T1".to_vec())
        );
    }

    #[tokio::test]
    async fn test_empty_token_deletes_key() {
        let backing = MemorySecureStore::new();
        let store = CredentialStore::new(Arc::new(backing.clone()));
        store.save(&sample_session()).await.unwrap();

        store.save_access_token("").await.unwrap();

        assert!(!backing.has_secret(ACCESS_TOKEN_KEY).await.unwrap());
        let loaded = store.load().await.unwrap();
        assert!(!loaded.is_authenticated());
        assert_eq!(loaded.refresh_token, "R1");
    }

    #[tokio::test]
    async fn test_corrupted_user_is_discarded() {
        let backing = MemorySecureStore::new();
        backing.set_secret(ACCESS_TOKEN_KEY, b"T1").await.unwrap();
        backing.set_secret(USER_KEY, b"{not json").await.unwrap();
        let store = CredentialStore::new(Arc::new(backing.clone()));

        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.access_token, "T1");
        assert!(loaded.user.is_none());
        assert!(!backing.has_secret(USER_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_null_user_is_absent() {
        let backing = MemorySecureStore::new();
        backing.set_secret(USER_KEY, b"null").await.unwrap();
        let store = CredentialStore::new(Arc::new(backing));

        assert!(store.load().await.unwrap().user.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let backing = MemorySecureStore::new();
        let store = CredentialStore::new(Arc::new(backing.clone()));
        store.save(&sample_session()).await.unwrap();

        store.clear().await.unwrap();

        assert!(backing.is_empty().await);
        assert_eq!(store.load().await.unwrap(), Session::default());
    }

    struct FailingDeletes {
        inner: MemorySecureStore,
    }

    #[async_trait]
    impl SecureStore for FailingDeletes {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.inner.set_secret(key, value).await
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            self.inner.get_secret(key).await
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            if key == ACCESS_TOKEN_KEY {
                return Err(BridgeError::OperationFailed("keychain locked".to_string()));
            }
            self.inner.delete_secret(key).await
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            self.inner.list_keys().await
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            self.inner.clear_all().await
        }
    }

    #[tokio::test]
    async fn test_clear_attempts_every_key() {
        let backing = MemorySecureStore::new();
        let store = CredentialStore::new(Arc::new(FailingDeletes {
            inner: backing.clone(),
        }));
        store.save(&sample_session()).await.unwrap();

        let result = store.clear().await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert!(!backing.has_secret(REFRESH_TOKEN_KEY).await.unwrap());
        assert!(!backing.has_secret(USER_KEY).await.unwrap());
    }
}

//! Session persisted in storage: access token, refresh token, cached user and
//! the "remember me" flag. Tokens leave storage as [`SecretString`] so they are
//! not printed by accident.

pub mod storage;
pub mod token;

pub use self::storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageEvent};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const ACCESS_TOKEN_KEY: &str = "multibpo_access_token";
pub const REFRESH_TOKEN_KEY: &str = "multibpo_refresh_token";
pub const USER_KEY: &str = "multibpo_user";
pub const REMEMBER_KEY: &str = "multibpo_remember";

/// Cached user record. Only `email` and `nome_completo` are required; every
/// other field the API sends is preserved in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub nome_completo: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.nome_completo.trim().is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Session {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub user: Option<User>,
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn access_token(&self) -> Result<Option<SecretString>, StorageError> {
        self.secret(ACCESS_TOKEN_KEY)
    }

    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn refresh_token(&self) -> Result<Option<SecretString>, StorageError> {
        self.secret(REFRESH_TOKEN_KEY)
    }

    fn secret(&self, key: &str) -> Result<Option<SecretString>, StorageError> {
        Ok(self
            .storage
            .get_item(key)?
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from))
    }

    /// The cached user, or `None` when it is missing, unparsable or lacks
    /// `email`/`nome_completo`.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn user(&self) -> Result<Option<User>, StorageError> {
        let Some(raw) = self.storage.get_item(USER_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) if user.is_complete() => Ok(Some(user)),
            Ok(_) => {
                debug!("stored user is missing email or nome_completo");
                Ok(None)
            }
            Err(err) => {
                warn!("stored user is not valid JSON: {err}");
                Ok(None)
            }
        }
    }

    /// Stores a new access token and, when the server rotated it, the refresh token.
    ///
    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), StorageError> {
        self.storage.set_item(ACCESS_TOKEN_KEY, access)?;
        if let Some(refresh) = refresh {
            self.storage.set_item(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn save_auth(
        &self,
        access: &SecretString,
        refresh: &SecretString,
        user: &User,
    ) -> Result<(), StorageError> {
        let user = serde_json::to_string(user).map_err(|source| StorageError::Encode {
            key: USER_KEY.to_string(),
            source,
        })?;

        self.storage
            .set_item(ACCESS_TOKEN_KEY, access.expose_secret())?;
        self.storage
            .set_item(REFRESH_TOKEN_KEY, refresh.expose_secret())?;
        self.storage.set_item(USER_KEY, &user)?;
        debug!("session saved");
        Ok(())
    }

    /// Removes every session key, including the remember flag.
    ///
    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, REMEMBER_KEY] {
            self.storage.remove_item(key)?;
        }
        debug!("session cleared");
        Ok(())
    }

    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn set_remember(&self, remember: bool) -> Result<(), StorageError> {
        if remember {
            self.storage.set_item(REMEMBER_KEY, "true")
        } else {
            self.storage.remove_item(REMEMBER_KEY)
        }
    }

    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn remember(&self) -> Result<bool, StorageError> {
        Ok(self.storage.get_item(REMEMBER_KEY)?.as_deref() == Some("true"))
    }

    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn snapshot(&self) -> Result<Session, StorageError> {
        Ok(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            user: self.user()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryStorage::new()))
    }

    fn user() -> User {
        User {
            email: "ana@multibpo.com.br".to_string(),
            nome_completo: "Ana Souza".to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn save_and_clear_session() -> Result<()> {
        let session = store();
        session.save_auth(
            &SecretString::from("access".to_string()),
            &SecretString::from("refresh".to_string()),
            &user(),
        )?;
        session.set_remember(true)?;

        let snapshot = session.snapshot()?;
        assert_eq!(
            snapshot.access_token.as_ref().map(|t| t.expose_secret()),
            Some("access")
        );
        assert_eq!(
            snapshot.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("refresh")
        );
        assert_eq!(snapshot.user, Some(user()));
        assert!(session.remember()?);

        session.clear()?;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, REMEMBER_KEY] {
            assert_eq!(session.storage().get_item(key)?, None);
        }
        Ok(())
    }

    #[test]
    fn set_tokens_keeps_refresh_unless_rotated() -> Result<()> {
        let session = store();
        session.set_tokens("a1", Some("r1"))?;
        session.set_tokens("a2", None)?;

        assert_eq!(
            session.access_token()?.map(|t| t.expose_secret().to_string()),
            Some("a2".to_string())
        );
        assert_eq!(
            session.refresh_token()?.map(|t| t.expose_secret().to_string()),
            Some("r1".to_string())
        );
        Ok(())
    }

    #[test]
    fn incomplete_user_is_ignored() -> Result<()> {
        let session = store();
        session
            .storage()
            .set_item(USER_KEY, &json!({ "email": "a@b.co" }).to_string())?;
        assert_eq!(session.user()?, None);

        session.storage().set_item(
            USER_KEY,
            &json!({ "email": "a@b.co", "nome_completo": "" }).to_string(),
        )?;
        assert_eq!(session.user()?, None);

        session.storage().set_item(USER_KEY, "{broken")?;
        assert_eq!(session.user()?, None);
        Ok(())
    }

    #[test]
    fn user_keeps_extra_fields() -> Result<()> {
        let session = store();
        session.storage().set_item(
            USER_KEY,
            &json!({
                "id": 7,
                "email": "a@b.co",
                "nome_completo": "A B",
                "cpf": "111.444.777-35"
            })
            .to_string(),
        )?;

        let user = session.user()?;
        assert_eq!(user.as_ref().and_then(|u| u.field("id")), Some(&json!(7)));
        assert_eq!(
            user.as_ref().and_then(|u| u.field("cpf")),
            Some(&json!("111.444.777-35"))
        );
        Ok(())
    }

    #[test]
    fn blank_tokens_count_as_absent() -> Result<()> {
        let session = store();
        session.storage().set_item(ACCESS_TOKEN_KEY, "  ")?;
        assert!(session.access_token()?.is_none());
        Ok(())
    }
}

//! Account registration and password authentication.
//!
//! Passwords are stored as `salt_hex$sha256_hex(salt || password)` with a
//! fresh 16-byte salt per account.

use playhub_protocol::{Account, AccountId, AccountKind, unix_now};
use playhub_store::{DataStore, StoreError, create_record, list_records};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{SessionError, SessionRegistry};

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes `password` with a new random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

/// Checks `password` against a stored `salt$hash` string. Malformed
/// stored values never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    digest(&salt, password).as_slice() == expected.as_slice()
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

impl<S: DataStore> SessionRegistry<S> {
    /// Creates an account of `kind`.
    ///
    /// Names are trimmed. Uniqueness is per collection: a player and a
    /// developer may share a name.
    ///
    /// # Errors
    /// - [`SessionError::InvalidName`] for a blank name
    /// - [`SessionError::WeakPassword`] below [`MIN_PASSWORD_LEN`]
    /// - [`SessionError::UserExists`] if the name is taken
    pub async fn register_account(
        &self,
        kind: AccountKind,
        name: &str,
        password: &str,
    ) -> Result<Account, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidName);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SessionError::WeakPassword);
        }

        let _guard = self.name_locks.lock((kind, name.to_string())).await;
        if self.find_account(kind, name).await?.is_some() {
            return Err(SessionError::UserExists(name.to_string()));
        }

        let account = Account {
            id: AccountId::generate(),
            name: name.to_string(),
            password_hash: hash_password(password),
            played_games: Default::default(),
            created_at: unix_now(),
        };
        match create_record(self.store.as_ref(), kind.collection(), account.id.as_str(), &account)
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => {
                return Err(SessionError::UserExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(%kind, account_id = %account.id, name, "account registered");
        Ok(account)
    }

    /// Verifies a name/password pair.
    ///
    /// # Errors
    /// [`SessionError::InvalidCredentials`] for an unknown name or a wrong
    /// password alike.
    pub async fn authenticate(
        &self,
        kind: AccountKind,
        name: &str,
        password: &str,
    ) -> Result<Account, SessionError> {
        let account = self.find_account(kind, name.trim()).await?;
        match account {
            Some(account) if verify_password(&account.password_hash, password) => {
                tracing::debug!(%kind, account_id = %account.id, "authenticated");
                Ok(account)
            }
            _ => {
                tracing::info!(%kind, "authentication failed");
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    async fn find_account(
        &self,
        kind: AccountKind,
        name: &str,
    ) -> Result<Option<Account>, SessionError> {
        let accounts: Vec<Account> = list_records(self.store.as_ref(), kind.collection()).await?;
        Ok(accounts.into_iter().find(|a| a.name == name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playhub_store::MemoryStore;

    use super::*;
    use crate::SessionConfig;

    fn registry() -> SessionRegistry<MemoryStore> {
        SessionRegistry::new(Arc::new(MemoryStore::new()), SessionConfig::default())
    }

    #[test]
    fn test_hash_password_verifies_and_salts() {
        let a = hash_password("hunter22");
        let b = hash_password("hunter22");
        assert_ne!(a, b);
        assert!(verify_password(&a, "hunter22"));
        assert!(!verify_password(&a, "hunter23"));
    }

    #[test]
    fn test_verify_password_malformed_hash_is_false() {
        assert!(!verify_password("no-separator", "x"));
        assert!(!verify_password("zz$abcd", "x"));
        assert!(!verify_password("abc$abcd", "x"));
        assert!(!verify_password("abcd$not-hex", "x"));
    }

    #[test]
    fn test_verify_password_hash_case_is_ignored() {
        let stored = hash_password("hunter22");
        assert!(verify_password(&stored.to_uppercase(), "hunter22"));
    }

    #[tokio::test]
    async fn test_register_account_weak_password_rejected() {
        let reg = registry();
        let err = reg
            .register_account(AccountKind::Player, "ann", "12345")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WeakPassword));
    }

    #[tokio::test]
    async fn test_register_account_blank_name_rejected() {
        let reg = registry();
        let err = reg
            .register_account(AccountKind::Player, "   ", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidName));
    }

    #[tokio::test]
    async fn test_register_account_duplicate_name_same_kind_rejected() {
        let reg = registry();
        reg.register_account(AccountKind::Player, "ann", "secret1")
            .await
            .unwrap();
        let err = reg
            .register_account(AccountKind::Player, " ann ", "secret2")
            .await
            .unwrap_err();
        assert_eq!(err.code(), playhub_protocol::ErrorCode::UserExists);
    }

    #[tokio::test]
    async fn test_register_account_same_name_other_kind_allowed() {
        let reg = registry();
        reg.register_account(AccountKind::Player, "ann", "secret1")
            .await
            .unwrap();
        assert!(
            reg.register_account(AccountKind::Developer, "ann", "secret1")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_authenticate_unknown_name_and_bad_password_look_the_same() {
        let reg = registry();
        reg.register_account(AccountKind::Player, "ann", "secret1")
            .await
            .unwrap();

        let unknown = reg
            .authenticate(AccountKind::Player, "bob", "secret1")
            .await
            .unwrap_err();
        let wrong = reg
            .authenticate(AccountKind::Player, "ann", "wrong-pw")
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.code(), wrong.code());
    }

    #[tokio::test]
    async fn test_authenticate_wrong_kind_fails() {
        let reg = registry();
        reg.register_account(AccountKind::Developer, "dev", "secret1")
            .await
            .unwrap();
        let result = reg.authenticate(AccountKind::Player, "dev", "secret1").await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_valid_returns_account() {
        let reg = registry();
        let created = reg
            .register_account(AccountKind::Player, "ann", "secret1")
            .await
            .unwrap();
        let account = reg
            .authenticate(AccountKind::Player, "ann", "secret1")
            .await
            .unwrap();
        assert_eq!(account.id, created.id);
    }
}

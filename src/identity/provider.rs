//! Credential verification against the shared user store.
//! Argon2 work runs on the blocking pool behind a semaphore so a burst of
//! login attempts cannot monopolize either the async runtime or the CPU.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::security::PasswordPolicy;
use crate::store::UserStore;
use super::{AuthMode, Principal};

pub struct AuthManager {
    store: Arc<dyn UserStore>,
    policy: Arc<PasswordPolicy>,
    hash_gate: Arc<Semaphore>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn UserStore>, policy: Arc<PasswordPolicy>, max_concurrent_hashes: usize) -> Self {
        Self {
            store,
            policy,
            hash_gate: Arc::new(Semaphore::new(max_concurrent_hashes.max(1))),
        }
    }

    /// Hash a new password under the configured work factor.
    pub async fn hash_password(&self, plaintext: &str) -> AuthResult<String> {
        let _permit = self.hash_gate.acquire().await.map_err(|_| AuthError::Internal)?;
        let policy = self.policy.clone();
        let pw = plaintext.to_string();
        tokio::task::spawn_blocking(move || policy.hash_password(&pw))
            .await
            .map_err(|_| AuthError::Internal)?
            .map_err(|_| AuthError::Internal)
    }

    /// Resolve raw credentials to a principal, or fail with the merged
    /// `InvalidCredentials`. An unknown identifier verifies against a decoy
    /// hash so the two failure causes stay timing-equivalent.
    pub async fn authenticate(&self, identifier: &str, password: &str, mode: AuthMode) -> AuthResult<Principal> {
        let _permit = self.hash_gate.acquire().await.map_err(|_| AuthError::Internal)?;
        let account = self.store.find_by_email(identifier);
        let policy = self.policy.clone();
        let pw = password.to_string();
        let (ok, account) = tokio::task::spawn_blocking(move || match account {
            Some(acct) => {
                let ok = policy.verify_password(&acct.password_hash, &pw);
                (ok, Some(acct))
            }
            None => (policy.verify_decoy(&pw), None),
        })
        .await
        .map_err(|_| AuthError::Internal)?;

        match (ok, account) {
            (true, Some(acct)) => {
                info!(target: "auth", user = %acct.username, mode = ?mode, "auth.login");
                Ok(Principal {
                    user_id: acct.id,
                    username: acct.username,
                    role: acct.role,
                    mode,
                })
            }
            _ => {
                // One log line for both causes; nothing distinguishes them.
                info!(target: "auth", "auth.login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use crate::store::{MemoryUserStore, UserAccount};

    fn manager_with_alice() -> AuthManager {
        let policy = Arc::new(PasswordPolicy::new(1024, 1, 1));
        let store = Arc::new(MemoryUserStore::new());
        let hash = policy.hash_password("Secret123!").expect("hash");
        store
            .save(UserAccount::new("alice", "alice@x.com", hash, Role::User))
            .expect("save");
        AuthManager::new(store, policy, 2)
    }

    #[tokio::test]
    async fn registered_credentials_authenticate_with_user_role() {
        let mgr = manager_with_alice();
        let p = mgr
            .authenticate("alice@x.com", "Secret123!", AuthMode::Session)
            .await
            .expect("authenticate");
        assert_eq!(p.username, "alice");
        assert_eq!(p.role, Role::User);
        assert_eq!(p.mode, AuthMode::Session);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let mgr = manager_with_alice();
        let wrong_pw = mgr
            .authenticate("alice@x.com", "wrong", AuthMode::Session)
            .await
            .expect_err("wrong password");
        let unknown = mgr
            .authenticate("nobody@x.com", "Secret123!", AuthMode::Session)
            .await
            .expect_err("unknown email");
        assert!(matches!(wrong_pw, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
        assert_eq!(wrong_pw.http_status(), unknown.http_status());
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_on_email() {
        let mgr = manager_with_alice();
        assert!(mgr
            .authenticate("Alice@X.com", "Secret123!", AuthMode::Token)
            .await
            .is_ok());
    }
}

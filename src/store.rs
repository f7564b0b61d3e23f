//! User account records and the credential store seam.
//! The store is an opaque collaborator to the security chains: lookup by
//! email or id, save with an email-uniqueness guarantee, nothing else.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Opaque PHC string. Never serialized out of the store.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Free-form metadata blob.
    #[serde(default)]
    pub attrs: serde_json::Value,
}

impl UserAccount {
    pub fn new(username: &str, email: &str, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            attrs: serde_json::Value::Null,
        }
    }
}

pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<UserAccount>;
    fn find_by_id(&self, id: &Uuid) -> Option<UserAccount>;
    /// Persist a new account. Fails with `Conflict` when the email is taken.
    fn save(&self, account: UserAccount) -> AuthResult<()>;
    fn list(&self) -> Vec<UserAccount>;
}

/// In-process store keyed by lowercased email. The check-and-insert in `save`
/// runs under a single write lock, so concurrent registrations for the same
/// email cannot both succeed.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserAccount>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl UserStore for MemoryUserStore {
    fn find_by_email(&self, email: &str) -> Option<UserAccount> {
        self.users.read().get(&email_key(email)).cloned()
    }

    fn find_by_id(&self, id: &Uuid) -> Option<UserAccount> {
        self.users.read().values().find(|u| &u.id == id).cloned()
    }

    fn save(&self, account: UserAccount) -> AuthResult<()> {
        let key = email_key(&account.email);
        let mut users = self.users.write();
        if users.contains_key(&key) {
            return Err(AuthError::Conflict);
        }
        users.insert(key, account);
        Ok(())
    }

    fn list(&self) -> Vec<UserAccount> {
        let mut out: Vec<UserAccount> = self.users.read().values().cloned().collect();
        out.sort_by(|a, b| a.email.cmp(&b.email));
        out
    }
}

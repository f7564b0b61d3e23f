use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::authorizer::Role;

/// How the principal was admitted: a server-held session or a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Session,
    Token,
}

/// The authenticated identity resolved for one request (token mode) or one
/// session (session mode). Owned by the chain that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub mode: AuthMode,
}

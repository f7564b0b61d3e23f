//! Signed, time-bounded bearer tokens for the API chain.
//! HS256 over a process-wide secret loaded once at startup; verification is
//! pure and never touches stored state.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use super::{AuthMode, Principal, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

pub struct TokenService {
    secret: String,
    issuer: String,
}

impl TokenService {
    pub fn new(secret: &str, issuer: &str) -> Self {
        Self { secret: secret.to_string(), issuer: issuer.to_string() }
    }

    pub fn issue(&self, principal: &Principal, ttl: Duration) -> AuthResult<String> {
        let now = Utc::now().timestamp() as u64;
        // expiry must be strictly after issued-at
        let ttl_secs = ttl.as_secs().max(1);
        let claims = Claims {
            sub: principal.user_id.to_string(),
            username: principal.username.clone(),
            role: principal.role,
            iat: now,
            exp: now + ttl_secs,
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|_| AuthError::Internal)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })?;
        // Expiry is exclusive: the library only rejects exp < now, but the
        // token must already be dead the instant it reaches exp.
        if data.claims.exp <= Utc::now().timestamp() as u64 {
            return Err(AuthError::TokenExpired);
        }
        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::TokenInvalid)?;
        Ok(Principal {
            user_id,
            username: data.claims.username,
            role: data.claims.role,
            mode: AuthMode::Token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", "authgate")
    }

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            role,
            mode: AuthMode::Token,
        }
    }

    #[test]
    fn issue_then_verify_round_trip() {
        let svc = service();
        let p = principal(Role::Admin);
        let token = svc.issue(&p, Duration::from_secs(60)).expect("issue");
        let back = svc.verify(&token).expect("verify");
        assert_eq!(back.user_id, p.user_id);
        assert_eq!(back.username, "alice");
        assert_eq!(back.role, Role::Admin);
        assert_eq!(back.mode, AuthMode::Token);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let svc = service();
        let p = principal(Role::User);
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: p.user_id.to_string(),
            username: p.username.clone(),
            role: p.role,
            iat: now - 120,
            exp: now - 60,
            iss: "authgate".to_string(),
        };
        let stale = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .expect("encode");
        assert!(matches!(svc.verify(&stale), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn token_is_rejected_at_exactly_its_expiry_instant() {
        let svc = service();
        let p = principal(Role::User);
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: p.user_id.to_string(),
            username: p.username.clone(),
            role: p.role,
            iat: now - 60,
            exp: now,
            iss: "authgate".to_string(),
        };
        let boundary = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .expect("encode");
        assert!(matches!(svc.verify(&boundary), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn tampered_payload_is_invalid_never_expired() {
        let svc = service();
        let token = svc.issue(&principal(Role::User), Duration::from_secs(60)).expect("issue");
        let mut parts: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        assert_eq!(parts.len(), 3);
        // flip one character in the payload segment
        let mut payload: Vec<u8> = parts[1].clone().into_bytes();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();
        let tampered = parts.join(".");
        assert!(matches!(svc.verify(&tampered), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn wrong_secret_or_issuer_is_invalid() {
        let svc = service();
        let other = TokenService::new("other-secret", "authgate");
        let token = other.issue(&principal(Role::User), Duration::from_secs(60)).expect("issue");
        assert!(matches!(svc.verify(&token), Err(AuthError::TokenInvalid)));

        let foreign = TokenService::new("test-secret", "someone-else");
        let token = foreign.issue(&principal(Role::User), Duration::from_secs(60)).expect("issue");
        assert!(matches!(svc.verify(&token), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn garbage_is_invalid() {
        let svc = service();
        assert!(matches!(svc.verify("not-a-token"), Err(AuthError::TokenInvalid)));
        assert!(matches!(svc.verify(""), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn expiry_is_strictly_after_issue_even_for_zero_ttl() {
        let svc = service();
        let token = svc.issue(&principal(Role::User), Duration::ZERO).expect("issue");
        // Still valid immediately: the service clamps ttl to one second.
        assert!(svc.verify(&token).is_ok());
    }
}

//! Password hashing with a tunable work factor.
//! Produces PHC-format argon2id strings with a fresh random salt per call.
//! Hashing is intentionally slow; callers run it off the async runtime and
//! bound concurrency (see `identity::provider`).

use anyhow::{Result, anyhow};
use argon2::{Argon2, Params, PasswordHasher, PasswordVerifier};
use base64::Engine;
use once_cell::sync::OnceCell;
use password_hash::{PasswordHash, SaltString};

/// Argon2id hasher configured with an explicit work factor.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
    /// Hash of a throwaway secret, computed once with the same cost parameters.
    /// Verifying unknown identifiers against it keeps rejection timing uniform.
    decoy: OnceCell<String>,
}

impl PasswordPolicy {
    pub fn new(m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
        Self { m_cost, t_cost, p_cost, decoy: OnceCell::new() }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, None)
            .map_err(|e| anyhow!("bad argon2 params: {}", e))?;
        Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let phc = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    pub fn verify_password(&self, hash: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else { return false };
        let Ok(argon2) = self.argon2() else { return false };
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    }

    /// Burn the same work as a real verification, then reject.
    /// Used when no account matches the presented identifier.
    pub fn verify_decoy(&self, password: &str) -> bool {
        let decoy = self.decoy.get_or_init(|| {
            let mut noise = [0u8; 24];
            let _ = getrandom::getrandom(&mut noise);
            let secret = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(noise);
            self.hash_password(&secret).unwrap_or_default()
        });
        let _ = self.verify_password(decoy, password);
        false
    }
}

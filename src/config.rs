//! Process-wide settings, read once from the environment at startup.
//! Nothing in here is mutated after the server starts accepting traffic.

use std::time::Duration;

const DEV_JWT_SECRET: &str = "authgate-dev-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct Settings {
    pub http_port: u16,
    /// HS256 signing secret for bearer tokens. Loaded once, never rotated mid-process.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl: Duration,
    pub session_ttl: Duration,
    pub argon2_m_cost: u32,
    pub argon2_t_cost: u32,
    pub argon2_p_cost: u32,
    /// Upper bound on concurrently running argon2 computations.
    pub max_concurrent_hashes: usize,
    pub admin_password: String,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok()).unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("AUTHGATE_JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(not(debug_assertions)) {
                tracing::warn!("AUTHGATE_JWT_SECRET not set, using insecure development secret");
            }
            DEV_JWT_SECRET.to_string()
        });
        let admin_password = std::env::var("AUTHGATE_ADMIN_PASSWORD").unwrap_or_else(|_| {
            if cfg!(not(debug_assertions)) {
                tracing::warn!("AUTHGATE_ADMIN_PASSWORD not set, using insecure default 'admin'");
            }
            "admin".to_string()
        });
        Self {
            http_port: env_parse("AUTHGATE_HTTP_PORT", 7878u16),
            jwt_secret,
            jwt_issuer: std::env::var("AUTHGATE_JWT_ISSUER").unwrap_or_else(|_| "authgate".to_string()),
            token_ttl: Duration::from_secs(env_parse("AUTHGATE_TOKEN_TTL_SECS", 3600u64)),
            session_ttl: Duration::from_secs(env_parse("AUTHGATE_SESSION_TTL_SECS", 3600u64)),
            // Argon2 defaults (19 MiB, 2 passes, 1 lane); tune the work factor here.
            argon2_m_cost: env_parse("AUTHGATE_ARGON2_M_COST", 19456u32),
            argon2_t_cost: env_parse("AUTHGATE_ARGON2_T_COST", 2u32),
            argon2_p_cost: env_parse("AUTHGATE_ARGON2_P_COST", 1u32),
            max_concurrent_hashes: env_parse("AUTHGATE_MAX_CONCURRENT_HASHES", 4usize),
            admin_password,
        }
    }

    /// Settings for tests: fast hashing, fixed secret, ephemeral port.
    pub fn for_tests() -> Self {
        Self {
            http_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "authgate".to_string(),
            token_ttl: Duration::from_secs(3600),
            session_ttl: Duration::from_secs(3600),
            argon2_m_cost: 1024,
            argon2_t_cost: 1,
            argon2_p_cost: 1,
            max_concurrent_hashes: 4,
            admin_password: "admin".to_string(),
        }
    }
}

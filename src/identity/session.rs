//! Server-held session state for the form-login chain.
//! Sessions are keyed by an opaque bearer value stored in the client cookie;
//! each carries one principal and one CSRF token for its lifetime.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use super::Principal;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub csrf_token: String,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Lock discipline: no method ever holds more than one of the two locks at a
/// time. Guards are bound in their own statements so they drop before the
/// next lock is taken.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    user_index: RwLock<HashMap<Uuid, HashSet<String>>>,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
            user_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let sid = gen_id();
        let token = gen_id();
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            csrf_token: gen_id(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        {
            let mut m = self.sessions.write();
            m.insert(token.clone(), SessionEntry { session: sess.clone() });
        }
        {
            let mut uidx = self.user_index.write();
            uidx.entry(principal.user_id).or_default().insert(token);
        }
        info!(target: "session", user = %principal.username, sid = %sid, ttl_secs = self.ttl.as_secs(), "session.issue");
        sess
    }

    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        {
            let map = self.sessions.read();
            match map.get(token) {
                Some(ent) if ent.session.expires_at > now => {
                    return Some(ent.session.principal.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: prune the session from both maps.
        let removed = self.sessions.write().remove(token);
        if let Some(ent) = removed {
            self.detach_from_index(&ent.session.principal.user_id, token);
        }
        None
    }

    fn detach_from_index(&self, user_id: &Uuid, token: &str) {
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(user_id) {
            set.remove(token);
            if set.is_empty() {
                idx.remove(user_id);
            }
        }
    }

    /// CSRF token for a live session; None for unknown, revoked, or expired tokens.
    pub fn csrf_for(&self, token: &str) -> Option<String> {
        self.validate(token)?;
        self.sessions.read().get(token).map(|e| e.session.csrf_token.clone())
    }

    /// Invalidate one session. The removal happens under the write lock, so a
    /// racing validate observes the session either fully present or fully gone.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        match removed {
            Some(ent) => {
                self.detach_from_index(&ent.session.principal.user_id, token);
                info!(target: "session", sid = %ent.session.session_id, "session.logout");
                true
            }
            None => false,
        }
    }

    /// Drop every live session belonging to one user.
    pub fn revoke_user(&self, user_id: &Uuid) -> usize {
        let tokens = self.user_index.write().remove(user_id);
        let mut count = 0usize;
        if let Some(tokens) = tokens {
            let mut s = self.sessions.write();
            for t in &tokens {
                if s.remove(t).is_some() {
                    count += 1;
                }
            }
        }
        info!(target: "session", user_id = %user_id, count = count, "session.revoke");
        count
    }
}

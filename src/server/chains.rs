//! Chain selection and the two security middlewares.
//!
//! Every inbound request is classified against a priority-ordered list of
//! (path prefix, chain) rules, evaluated top-down with first match winning:
//! the API namespace runs the stateless token chain, everything else the
//! stateful session chain. The token chain answers failures with a terminal
//! 401 and never redirects; the session chain redirects to the login entry
//! point with the original destination preserved, and stamps security
//! headers on every response it serves, authorized or not.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use tracing::info;

use crate::error::AuthError;
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "authgate_session";

/// Raw session cookie value, stashed in request extensions for logout/csrf handlers.
#[derive(Debug, Clone)]
pub struct SessionCookie(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    Token,
    Session,
}

pub struct ChainRule {
    pub prefix: &'static str,
    pub chain: ChainKind,
}

/// Ordered by priority: a request that could textually match both chains
/// (anything under `/api`) must hit the token rule first.
pub const CHAIN_RULES: &[ChainRule] = &[
    ChainRule { prefix: "/api", chain: ChainKind::Token },
    ChainRule { prefix: "/", chain: ChainKind::Session },
];

fn rule_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

pub fn select_chain(path: &str) -> ChainKind {
    for rule in CHAIN_RULES {
        if rule_matches(rule.prefix, path) {
            return rule.chain;
        }
    }
    ChainKind::Session
}

/// Token-chain sub-paths served without a bearer token (credential exchange).
fn token_chain_public(path: &str) -> bool {
    rule_matches("/api/auth", path)
}

/// Session-chain paths served without a session: login, registration,
/// static assets, liveness.
fn session_chain_public(path: &str) -> bool {
    path == "/login"
        || path == "/register"
        || path == "/healthz"
        || path.starts_with("/css/")
        || path.starts_with("/js/")
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

const CSP: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; frame-ancestors 'self'";

/// Response-shaping policy for the session chain, independent of the
/// authorization outcome.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert("Content-Security-Policy", HeaderValue::from_static(CSP));
    headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
}

fn requires_csrf(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn csrf_ok(state: &AppState, token: &str, headers: &HeaderMap) -> bool {
    let Some(provided) = headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match state.sessions.csrf_for(token) {
        Some(expected) => expected == provided,
        None => false,
    }
}

/// Entry point for every request: classify, then run the selected chain.
pub async fn security_pipeline(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match select_chain(req.uri().path()) {
        ChainKind::Token => token_chain(state, req, next).await,
        ChainKind::Session => session_chain(state, req, next).await,
    }
}

fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"status": "unauthorized"}))).into_response()
}

async fn token_chain(state: AppState, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if token_chain_public(&path) {
        return next.run(req).await;
    }
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string());
    let Some(token) = bearer else {
        return unauthorized_response();
    };
    match state.tokens.verify(&token) {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(e) => {
            // Expired and malformed are logged distinctly; the response is the same.
            info!(target: "auth", code = e.code_str(), path = %path, "bearer token rejected");
            unauthorized_response()
        }
    }
}

async fn session_chain(state: AppState, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let mut resp = if session_chain_public(&path) {
        // Attach the principal when a valid session rides along anyway.
        if let Some(token) = parse_cookie(req.headers(), SESSION_COOKIE) {
            if let Some(principal) = state.sessions.validate(&token) {
                req.extensions_mut().insert(principal);
                req.extensions_mut().insert(SessionCookie(token));
            }
        }
        next.run(req).await
    } else {
        let auth = parse_cookie(req.headers(), SESSION_COOKIE)
            .and_then(|t| state.sessions.validate(&t).map(|p| (t, p)));
        match auth {
            Some((token, principal)) => {
                if requires_csrf(req.method()) && !csrf_ok(&state, &token, req.headers()) {
                    AuthError::Csrf.into_response()
                } else {
                    req.extensions_mut().insert(principal);
                    req.extensions_mut().insert(SessionCookie(token));
                    next.run(req).await
                }
            }
            None => {
                // Preserve the original destination as the return target.
                let target = format!("/login?next={}", urlencoding::encode(&path));
                Redirect::to(&target).into_response()
            }
        }
    };
    apply_security_headers(resp.headers_mut());
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_namespace_routes_to_token_chain_first() {
        assert_eq!(select_chain("/api"), ChainKind::Token);
        assert_eq!(select_chain("/api/me"), ChainKind::Token);
        assert_eq!(select_chain("/api/auth/token"), ChainKind::Token);
        // prefix match is segment-aware, not textual
        assert_eq!(select_chain("/apix"), ChainKind::Session);
    }

    #[test]
    fn everything_else_routes_to_session_chain() {
        assert_eq!(select_chain("/"), ChainKind::Session);
        assert_eq!(select_chain("/login"), ChainKind::Session);
        assert_eq!(select_chain("/dashboard"), ChainKind::Session);
        assert_eq!(select_chain("/css/site.css"), ChainKind::Session);
    }

    #[test]
    fn chain_permit_lists() {
        assert!(token_chain_public("/api/auth/token"));
        assert!(token_chain_public("/api/auth"));
        assert!(!token_chain_public("/api/authx"));
        assert!(!token_chain_public("/api/me"));

        assert!(session_chain_public("/login"));
        assert!(session_chain_public("/register"));
        assert!(session_chain_public("/healthz"));
        assert!(session_chain_public("/js/app.js"));
        assert!(!session_chain_public("/dashboard"));
        assert!(!session_chain_public("/"));
    }

    #[test]
    fn csrf_required_for_mutating_methods_only() {
        assert!(!requires_csrf(&Method::GET));
        assert!(!requires_csrf(&Method::HEAD));
        assert!(!requires_csrf(&Method::OPTIONS));
        assert!(requires_csrf(&Method::POST));
        assert!(requires_csrf(&Method::DELETE));
    }

    #[test]
    fn cookie_parsing_picks_the_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; authgate_session=abc123; trailing=x"),
        );
        assert_eq!(parse_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(parse_cookie(&headers, "missing"), None);
        assert_eq!(parse_cookie(&HeaderMap::new(), SESSION_COOKIE), None);
    }

    #[test]
    fn security_header_set_is_complete() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers);
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "SAMEORIGIN");
        assert!(headers
            .get("Content-Security-Policy")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("frame-ancestors 'self'"));
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "strict-origin-when-cross-origin");
        assert_eq!(
            headers.get("Strict-Transport-Security").unwrap(),
            "max-age=31536000; includeSubDomains"
        );
    }
}

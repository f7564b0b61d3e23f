//!
//! authgate HTTP server
//! --------------------
//! Axum-based HTTP surface for the dual-chain authentication gateway.
//!
//! Responsibilities:
//! - Session-mode endpoints: registration, form login/logout with a
//!   cookie + CSRF token model, and a sample protected page.
//! - Token-mode endpoints under /api: credential-for-token exchange and
//!   bearer-protected resources.
//! - Route assembly with the security pipeline layered over everything.
//! - First-run bootstrap of the default admin account.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::AuthError;
use crate::identity::{AuthManager, AuthMode, Permission, Principal, Role, SessionManager, TokenService};
use crate::security::PasswordPolicy;
use crate::store::{MemoryUserStore, UserAccount, UserStore};

pub mod chains;
use chains::{SessionCookie, SESSION_COOKIE};

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@authgate.local";

/// Shared server state injected into all handlers.
///
/// Everything here is either immutable after startup (settings, signing key,
/// permission table) or internally synchronized (store, session manager), so
/// concurrent requests never share mutable authentication state.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn UserStore>,
    pub auth: Arc<AuthManager>,
    pub sessions: Arc<SessionManager>,
    pub tokens: Arc<TokenService>,
}

pub fn build_state(settings: Settings) -> AppState {
    let settings = Arc::new(settings);
    let policy = Arc::new(PasswordPolicy::new(
        settings.argon2_m_cost,
        settings.argon2_t_cost,
        settings.argon2_p_cost,
    ));
    let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let auth = Arc::new(AuthManager::new(store.clone(), policy, settings.max_concurrent_hashes));
    let sessions = Arc::new(SessionManager::new(settings.session_ttl));
    let tokens = Arc::new(TokenService::new(&settings.jwt_secret, &settings.jwt_issuer));
    AppState { settings, store, auth, sessions, tokens }
}

/// Create the admin account on first startup, unless one already exists.
pub async fn ensure_default_admin(state: &AppState) -> anyhow::Result<()> {
    if state.store.find_by_email(DEFAULT_ADMIN_EMAIL).is_some() {
        return Ok(());
    }
    if state.settings.admin_password == "admin" {
        warn!(target: "startup", "default admin password in use; set AUTHGATE_ADMIN_PASSWORD");
    }
    let hash = state
        .auth
        .hash_password(&state.settings.admin_password)
        .await
        .map_err(|e| anyhow::anyhow!("hashing admin password failed: {e}"))?;
    state
        .store
        .save(UserAccount::new("admin", DEFAULT_ADMIN_EMAIL, hash, Role::Admin))
        .map_err(|e| anyhow::anyhow!("saving admin account failed: {e}"))?;
    info!(target: "startup", "default admin account created");
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "authgate ok" }))
        // session chain
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/dashboard", get(dashboard))
        // token chain
        .route("/api/auth/token", post(issue_token))
        .route("/api/me", get(api_me))
        .route("/api/users", get(api_users))
        .route("/api/users/{id}/revoke", post(api_revoke_user))
        .layer(axum::middleware::from_fn_with_state(state.clone(), chains::security_pipeline))
        .with_state(state)
}

pub async fn run_with_settings(settings: Settings) -> anyhow::Result<()> {
    let state = build_state(settings);
    ensure_default_admin(&state).await?;
    let app = build_router(state.clone());
    let addr: SocketAddr = format!("0.0.0.0:{}", state.settings.http_port)
        .parse()
        .context("parsing bind address")?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using environment settings.
pub async fn run() -> anyhow::Result<()> {
    run_with_settings(Settings::from_env()).await
}

// Secure, HttpOnly cookie scoped to path / with SameSite=Strict
fn session_cookie_header(token: &str) -> String {
    format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, token)
}

fn clear_cookie_header() -> String {
    format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    )
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    email: String,
    password: String,
}

async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> impl IntoResponse {
    let username = payload.username.trim();
    let email = payload.email.trim();
    if username.is_empty() || email.is_empty() || !email.contains('@') || payload.password.is_empty() {
        return Redirect::to("/register?error");
    }
    let hash = match state.auth.hash_password(&payload.password).await {
        Ok(h) => h,
        Err(e) => {
            error!("registration hashing failed: {e}");
            return Redirect::to("/register?error");
        }
    };
    match state.store.save(UserAccount::new(username, email, hash, Role::User)) {
        Ok(()) => {
            info!(target: "auth", user = %username, "account registered");
            Redirect::to("/login")
        }
        // Conflict and any other failure look the same to the caller: no field detail.
        Err(_) => Redirect::to("/register?error"),
    }
}

/// Only ever redirect back into this origin.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n,
        _ => "/dashboard",
    }
}

async fn login(
    State(state): State<AppState>,
    Query(q): Query<LoginQuery>,
    Json(payload): Json<LoginPayload>,
) -> impl IntoResponse {
    match state.auth.authenticate(&payload.email, &payload.password, AuthMode::Session).await {
        Ok(principal) => {
            let sess = state.sessions.issue(principal);
            let target = safe_next(q.next.as_deref()).to_string();
            (
                AppendHeaders([(header::SET_COOKIE, session_cookie_header(&sess.token))]),
                Redirect::to(&target),
            )
                .into_response()
        }
        Err(AuthError::InvalidCredentials) => Redirect::to("/login?error").into_response(),
        Err(e) => {
            error!("login error: {e}");
            Redirect::to("/login?error").into_response()
        }
    }
}

async fn logout(
    State(state): State<AppState>,
    cookie: Option<Extension<SessionCookie>>,
) -> impl IntoResponse {
    if let Some(Extension(SessionCookie(token))) = cookie {
        state.sessions.logout(&token);
    }
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie_header())]),
        Redirect::to("/login?logout"),
    )
}

async fn get_csrf(
    State(state): State<AppState>,
    Extension(SessionCookie(token)): Extension<SessionCookie>,
) -> Result<impl IntoResponse, AuthError> {
    match state.sessions.csrf_for(&token) {
        Some(csrf) => Ok(Json(json!({"status": "ok", "csrf": csrf}))),
        None => Err(AuthError::Unauthenticated),
    }
}

async fn dashboard(Extension(principal): Extension<Principal>) -> Result<impl IntoResponse, AuthError> {
    if !principal.role.allows(Permission::ViewDashboard) {
        return Err(AuthError::Unauthorized);
    }
    Ok(Json(json!({
        "status": "ok",
        "user": principal.username,
        "role": principal.role,
        "mode": principal.mode,
    })))
}

async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenPayload>,
) -> Result<impl IntoResponse, AuthError> {
    // No session is created here: the exchange is stateless.
    let principal = state.auth.authenticate(&payload.email, &payload.password, AuthMode::Token).await?;
    let ttl = state.settings.token_ttl;
    let token = state.tokens.issue(&principal, ttl)?;
    Ok(Json(json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": ttl.as_secs(),
    })))
}

async fn api_me(Extension(principal): Extension<Principal>) -> Result<impl IntoResponse, AuthError> {
    if !principal.role.allows(Permission::ApiRead) {
        return Err(AuthError::Unauthorized);
    }
    Ok(Json(json!({
        "status": "ok",
        "user_id": principal.user_id,
        "user": principal.username,
        "role": principal.role,
        "mode": principal.mode,
    })))
}

async fn api_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, AuthError> {
    if !principal.role.allows(Permission::ManageUsers) {
        return Err(AuthError::Unauthorized);
    }
    let users: Vec<serde_json::Value> = state
        .store
        .list()
        .into_iter()
        .map(|u| json!({"id": u.id, "username": u.username, "email": u.email, "role": u.role}))
        .collect();
    Ok(Json(json!({"status": "ok", "users": users})))
}

/// Drop every live session of one user, e.g. after a credential change.
/// Idempotent: unknown ids and users with no sessions revoke zero.
async fn api_revoke_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    if !principal.role.allows(Permission::ManageUsers) {
        return Err(AuthError::Unauthorized);
    }
    let revoked = state.sessions.revoke_user(&user_id);
    info!(target: "auth", admin = %principal.username, user_id = %user_id, revoked = revoked, "sessions revoked");
    Ok(Json(json!({"status": "ok", "revoked": revoked})))
}

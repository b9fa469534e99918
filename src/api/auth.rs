use crate::api::errors::ApiError;
use crate::ingest::handler::AppState;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

/// Minimum length of an admin access key.
pub const MIN_KEY_LEN: usize = 4;

/// The admin access key, held only as an Argon2 PHC hash.
///
/// `None` means no key is configured and the admin routes are open.
#[derive(Debug, Default)]
pub struct AdminKey {
    hash: Mutex<Option<String>>,
}

impl AdminKey {
    /// No key configured.
    pub fn open() -> Self {
        Self::default()
    }

    /// Hash `key` and hold it as the current admin key.
    pub fn with_key(key: &str) -> Result<Self, ApiError> {
        let admin = Self::default();
        admin.set(key)?;
        Ok(admin)
    }

    pub fn is_configured(&self) -> bool {
        self.hash.lock().is_some()
    }

    /// Replace the current key.
    pub fn set(&self, key: &str) -> Result<(), ApiError> {
        let hash = hash_key(key)?;
        *self.hash.lock() = Some(hash);
        Ok(())
    }

    /// Check a presented key. Always `true` when no key is configured.
    pub fn verify(&self, presented: &str) -> bool {
        let guard = self.hash.lock();
        guard
            .as_deref()
            .is_none_or(|stored| verify_key(presented, stored))
    }
}

fn hash_key(key: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(key.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Key hashing failed: {e}")))
}

fn verify_key(presented: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware guarding the admin routes.
///
/// Passes every request through when no key is configured.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.admin.is_configured() {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    let Some(token) = token else {
        return ApiError::Unauthorized("Missing admin key".to_string()).into_response();
    };

    // Argon2 verification is CPU-bound.
    let state2 = Arc::clone(&state);
    let verified = tokio::task::spawn_blocking(move || state2.admin.verify(&token))
        .await
        .unwrap_or(false);

    if verified {
        next.run(request).await
    } else {
        tracing::warn!("Rejected admin request with wrong key");
        ApiError::Unauthorized("Invalid admin key".to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct KeyChangeRequest {
    pub new_key: String,
    pub confirm_key: String,
}

/// Check a key change before applying it.
pub fn validate_key_change(req: &KeyChangeRequest) -> Result<(), ApiError> {
    if req.new_key != req.confirm_key {
        return Err(ApiError::BadRequest("Keys do not match".to_string()));
    }
    if req.new_key.chars().count() < MIN_KEY_LEN {
        return Err(ApiError::BadRequest(format!(
            "Key must be at least {MIN_KEY_LEN} characters"
        )));
    }
    Ok(())
}

/// POST /api/admin/key: Replace the admin access key.
pub async fn change_admin_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeyChangeRequest>,
) -> Result<StatusCode, ApiError> {
    validate_key_change(&req)?;

    let state2 = Arc::clone(&state);
    tokio::task::spawn_blocking(move || state2.admin.set(&req.new_key))
        .await
        .map_err(|e| ApiError::Internal(format!("Key task panicked: {e}")))??;

    tracing::info!("Admin key updated");
    Ok(StatusCode::NO_CONTENT)
}

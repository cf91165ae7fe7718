//! HTTP Basic auth against the `USERNAME`/`PASSWORD` environment
//! variables. Reading them is fatal at startup if either is unset or
//! empty — there is no implicit "open" mode.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;

use vigil_core::FirewallError;

use crate::AppState;

#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, FirewallError> {
        let username = std::env::var("USERNAME").unwrap_or_default();
        let password = std::env::var("PASSWORD").unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(FirewallError::InvalidInput(
                "USERNAME and PASSWORD must both be set for the control plane".to_string(),
            ));
        }
        Ok(Self { username, password })
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }

    #[cfg(test)]
    pub(crate) fn for_test(username: &str, password: &str) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }
}

pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = header_value.strip_prefix("Basic ").ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let (username, password) = decoded.split_once(':').ok_or(StatusCode::UNAUTHORIZED)?;

    if state.credentials.matches(username, password) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

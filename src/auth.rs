use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Issues the session credential for `user_id`: `{user_id}.{base64 hmac-sha1}`.
pub fn sign_session(secret: &str, user_id: i64) -> String {
    let payload = user_id.to_string();
    let signature = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(payload.as_bytes());
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };
    format!("{payload}.{signature}")
}

pub fn verify_session(secret: &str, token: &str) -> Option<i64> {
    let (payload, signature) = token.rsplit_once('.')?;
    let user_id: i64 = payload.parse().ok()?;
    let signature = base64::engine::general_purpose::STANDARD
        .decode(signature)
        .ok()?;

    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(user_id)
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    })
}

#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);

        let user_id = session_token(&parts.headers)
            .and_then(|token| verify_session(&state.config.session_secret, token))
            .ok_or(AppError::Unauthorized)?;

        let user = {
            let db = state.conn()?;
            queries::get_user(&db, user_id)?
        };

        match user {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(user_id, "session names an unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}

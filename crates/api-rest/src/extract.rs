//! Request extractors: bearer authentication and client metadata.

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use mera_core::{Actor, CoreError, RequestContext};
use std::convert::Infallible;

/// The authenticated actor, resolved from the `Authorization: Bearer`
/// header. Rejects missing/malformed headers, failed verification, and
/// vanished or deactivated accounts with 401.
pub struct AuthActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::from(CoreError::TokenInvalidOrExpired))?;

        let actor = state.identity().authenticate(token)?;
        Ok(AuthActor(actor))
    }
}

/// Client IP and user agent, recorded with every disclosure. Infallible:
/// absent headers fall back to `"unknown"`.
pub struct ClientMeta(pub RequestContext);

#[async_trait]
impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        // Trust the proxy chain the same way the original did: first
        // x-forwarded-for hop, then x-real-ip.
        let ip_address = header("x-forwarded-for")
            .and_then(|chain| chain.split(',').next().map(|ip| ip.trim().to_owned()))
            .or_else(|| header("x-real-ip"))
            .unwrap_or_else(|| "unknown".into());
        let user_agent = header("user-agent").unwrap_or_else(|| "unknown".into());

        Ok(ClientMeta(RequestContext {
            ip_address,
            user_agent,
        }))
    }
}

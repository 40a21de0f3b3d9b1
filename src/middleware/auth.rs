use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{auth::verify_token, error::AppError, state::AppState, user::UserStore};

/// Connection authenticator. Runs before every protected handler and before
/// any WebSocket upgrade, so a bad credential terminates the attempt before
/// handler code sees it.
///
/// The token rides the `Authorization` header, or a `token=` query
/// parameter for WebSocket handshakes (browsers cannot set headers there).
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = if let Some(auth_header) = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("No credential provided".to_string()))?
    } else {
        let query = req.uri().query().unwrap_or("");
        query
            .split('&')
            .find_map(|p| p.strip_prefix("token="))
            .ok_or_else(|| AppError::Unauthorized("No credential provided".to_string()))?
    };

    // A missing secret is our fault, not the client's. Distinct from the
    // ordinary rejections so operators see it.
    let Some(secret) = state.config.jwt_secret.as_deref() else {
        tracing::error!("JWT_SECRET is not configured; refusing connection");
        return Err(AppError::Config("JWT_SECRET is not set".to_string()));
    };

    let claims = verify_token(token, secret)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid credential".to_string()))?;

    let user = state
        .user_repository
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credential".to_string()))?;

    req.extensions_mut().insert(user.id);

    Ok(next.run(req).await)
}

/// Extractor for the authenticated subject attached by `auth_middleware`.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Uuid>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("No credential provided".to_string()))
    }
}

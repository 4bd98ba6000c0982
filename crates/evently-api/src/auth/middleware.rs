/// Bearer authentication and role-based authorization
///
/// `authenticate` validates the access token and inserts [`AuthContext`]
/// into request extensions; handlers read identity only through that
/// extractor. `require_role` is layered on route groups that need a role
/// allowlist and fails closed when no identity is present.
use super::jwt::{TokenError, TokenKind};
use crate::audit::{audit_request, AuditContext, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use evently_core::UserRole;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Roles allowed on the moderation routes
pub const MODERATOR_ROLES: &[UserRole] = &[UserRole::Admin];

/// Identity of the caller, taken from a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_moderator(&self) -> bool {
        self.role.is_moderator()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthHeader => {
                AppError::Unauthorized("Missing Authorization header".to_string())
            }
            AuthError::InvalidAuthHeader => {
                AppError::Unauthorized("Invalid Authorization header format".to_string())
            }
            AuthError::InvalidToken(TokenError::Expired) => {
                AppError::Unauthorized("Token has expired".to_string())
            }
            AuthError::InvalidToken(_) => AppError::Unauthorized("Invalid or expired token".to_string()),
            AuthError::InsufficientPermissions => {
                AppError::Forbidden("Insufficient permissions".to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The header must split on a single space into exactly two parts, the
/// first being `Bearer` and the second non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Authentication middleware for `/api/**`
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let verified = bearer_token(request.headers()).and_then(|token| {
        state
            .tokens
            .verify(token, TokenKind::Access)
            .map_err(AuthError::from)
    });

    let payload = match verified {
        Ok(payload) => payload,
        Err(e) => {
            audit_request(
                &AuditEvent::TokenRejected { reason: e.to_string() },
                &AuditContext::from_headers(request.headers()),
            );
            state.metrics.record_auth("bearer", "rejected");
            return Err(e);
        }
    };

    request.extensions_mut().insert(AuthContext {
        user_id: payload.user_id,
        role: payload.role,
    });

    Ok(next.run(request).await)
}

/// Pure allowlist check; no role means no access
pub fn is_role_allowed(role: Option<UserRole>, allowed: &[UserRole]) -> bool {
    role.map(|r| allowed.contains(&r)).unwrap_or(false)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for role-based access control
///
/// ```ignore
/// let moderation = Router::new()
///     .route("/events/:id", patch(moderate_event))
///     .route_layer(middleware::from_fn(require_role(MODERATOR_ROLES)));
/// ```
pub fn require_role(
    allowed: &'static [UserRole],
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let ctx = request.extensions().get::<AuthContext>().copied();

            if !is_role_allowed(ctx.map(|c| c.role), allowed) {
                audit_request(
                    &AuditEvent::RoleGateDenied {
                        user_id: ctx.map(|c| c.user_id),
                        role: ctx.map(|c| c.role),
                        path: request.uri().path().to_string(),
                        allowed: allowed.to_vec(),
                    },
                    &AuditContext::from_headers(request.headers()),
                );

                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_accepts_well_formed_header() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_rejects_malformed_headers() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingAuthHeader)
        ));

        for value in ["Bearer", "Bearer ", "bearer abc", "Token abc", "Bearer a b", "Bearer  abc"] {
            assert!(
                matches!(bearer_token(&headers_with(value)), Err(AuthError::InvalidAuthHeader)),
                "accepted {value:?}"
            );
        }
    }

    #[test]
    fn test_role_allowlist() {
        assert!(is_role_allowed(Some(UserRole::Admin), MODERATOR_ROLES));
        assert!(!is_role_allowed(Some(UserRole::User), MODERATOR_ROLES));
        assert!(!is_role_allowed(None, MODERATOR_ROLES));
        assert!(is_role_allowed(
            Some(UserRole::User),
            &[UserRole::User, UserRole::Admin]
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_bearer_token_round_trips(token in "[A-Za-z0-9._-]{1,64}") {
            let headers = headers_with(&format!("Bearer {token}"));
            proptest::prop_assert_eq!(bearer_token(&headers).unwrap(), token.as_str());
        }

        #[test]
        fn prop_other_schemes_rejected(scheme in "[A-Za-z]{1,10}", token in "[A-Za-z0-9]{1,32}") {
            proptest::prop_assume!(scheme != "Bearer");
            let headers = headers_with(&format!("{scheme} {token}"));
            proptest::prop_assert!(bearer_token(&headers).is_err());
        }
    }

    #[test]
    fn test_auth_error_status() {
        use axum::http::StatusCode;
        assert_eq!(
            AuthError::MissingAuthHeader.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}

//! Authentication service layer
//!
//! Registration, login and token refresh. Every outcome is written to the
//! audit log.

use super::jwt::{Payload, TokenKind, TokenManager};
use super::password::PasswordHasher;
use crate::audit::{audit_request, AuditContext, AuditEvent};
use crate::error::AppError;
use evently_core::{NewUser, User, UserRepository, UserRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// User registration request. The role is never taken from the client.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub profile_picture_url: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

/// Token pair returned by register, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: Arc<TokenManager>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: PasswordHasher, tokens: Arc<TokenManager>) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    fn issue_pair(&self, user: &User) -> Result<AuthResponse, AppError> {
        let payload = Payload {
            user_id: user.id,
            role: user.role,
        };
        Ok(AuthResponse {
            access_token: self.tokens.issue(payload, TokenKind::Access)?,
            refresh_token: self.tokens.issue(payload, TokenKind::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Register a new account with role `USER` and issue a token pair
    pub async fn register(&self, request: RegisterRequest, ctx: &AuditContext) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&request.email);

        if self.users.find_user_by_email(&email).await?.is_some() {
            audit_request(
                &AuditEvent::RegistrationRejected {
                    email,
                    reason: "Email already registered".to_string(),
                },
                ctx,
            );
            return Err(AppError::AlreadyExists("User with this email already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&request.password).await?;

        let user = self
            .users
            .create_user(&NewUser {
                email: email.clone(),
                password_hash,
                nickname: request.nickname,
                phone: request.phone,
                profile_picture_url: request.profile_picture_url,
                role: UserRole::User,
            })
            .await
            .map_err(|e| {
                audit_request(
                    &AuditEvent::RegistrationRejected {
                        email: email.clone(),
                        reason: e.to_string(),
                    },
                    ctx,
                );
                AppError::from(e)
            })?;

        audit_request(
            &AuditEvent::Registered {
                user_id: user.id,
                email: user.email.clone(),
            },
            ctx,
        );

        self.issue_pair(&user)
    }

    /// Verify credentials and issue a token pair. Unknown email and wrong
    /// password fail with the same error after the same Argon2 work.
    pub async fn login(&self, request: LoginRequest, ctx: &AuditContext) -> Result<AuthResponse, AppError> {
        let email = normalize_email(&request.email);

        let user = match self.users.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.hasher.verify_decoy(&request.password).await;
                self.login_failed(email, "Unknown email", ctx);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(&request.password, &user.password_hash).await? {
            self.login_failed(email, "Invalid password", ctx);
            return Err(AppError::InvalidCredentials);
        }

        audit_request(
            &AuditEvent::LoggedIn {
                user_id: user.id,
                email: user.email.clone(),
            },
            ctx,
        );

        self.issue_pair(&user)
    }

    fn login_failed(&self, email: String, reason: &str, ctx: &AuditContext) {
        audit_request(
            &AuditEvent::LoginRejected {
                email,
                reason: reason.to_string(),
            },
            ctx,
        );
    }

    /// Exchange a refresh token for a new access token; the refresh token
    /// rotates only near its expiry.
    pub fn refresh(&self, request: RefreshRequest, ctx: &AuditContext) -> Result<AuthResponse, AppError> {
        let refreshed = match self.tokens.refresh(&request.refresh_token) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                audit_request(&AuditEvent::RefreshRejected { reason: e.to_string() }, ctx);
                return Err(e.into());
            }
        };

        if let Ok(payload) = self.tokens.verify(&refreshed.access_token, TokenKind::Access) {
            audit_request(
                &AuditEvent::TokensRefreshed {
                    user_id: payload.user_id,
                    rotated: refreshed.rotated,
                },
                ctx,
            );
        }

        Ok(AuthResponse {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordConfig;
    use evently_core::{AuthConfig, MemoryStore};

    fn service() -> (AuthService, Arc<MemoryStore>, Arc<TokenManager>) {
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenManager::new(&AuthConfig {
            access_secret: "access-secret-for-service-tests-000".to_string(),
            refresh_secret: "refresh-secret-for-service-tests-00".to_string(),
            ..Default::default()
        }));
        let hasher = PasswordHasher::new(PasswordConfig::light()).unwrap();
        (
            AuthService::new(store.clone(), hasher, tokens.clone()),
            store,
            tokens,
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "correct-horse".to_string(),
            nickname: Some("Alice".to_string()),
            phone: None,
            profile_picture_url: None,
        }
    }

    #[tokio::test]
    async fn test_register_issues_user_tokens() {
        let (svc, store, tokens) = service();
        let ctx = AuditContext::default();

        let pair = svc.register(register_request("Alice@Example.com"), &ctx).await.unwrap();
        assert_eq!(pair.token_type, "Bearer");

        let payload = tokens.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(payload.role, UserRole::User);
        assert!(tokens.verify(&pair.refresh_token, TokenKind::Refresh).is_ok());

        let stored = store.find_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(stored.id, payload.user_id);
        assert_ne!(stored.password_hash, "correct-horse");
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_conflict() {
        let (svc, store, _) = service();
        let ctx = AuditContext::default();
        svc.register(register_request("bob@example.com"), &ctx).await.unwrap();

        let first = store.find_user_by_email("bob@example.com").await.unwrap().unwrap();
        let err = svc.register(register_request("bob@example.com"), &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        // No second write: the stored record is untouched
        let after = store.find_user_by_email("bob@example.com").await.unwrap().unwrap();
        assert_eq!(first.password_hash, after.password_hash);
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email() {
        let (svc, _, _) = service();
        let ctx = AuditContext::default();
        svc.register(register_request("carol@example.com"), &ctx).await.unwrap();

        let wrong = svc
            .login(
                LoginRequest {
                    email: "carol@example.com".to_string(),
                    password: "wrong-password".to_string(),
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));

        let unknown = svc
            .login(
                LoginRequest {
                    email: "nobody@example.com".to_string(),
                    password: "correct-horse".to_string(),
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_password() {
        let (svc, _, _) = service();
        let before = svc.hasher.verification_count();

        let err = svc
            .login(
                LoginRequest {
                    email: "ghost@example.com".to_string(),
                    password: "whatever-password".to_string(),
                },
                &AuditContext::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(svc.hasher.verification_count(), before + 1);
    }

    #[tokio::test]
    async fn test_login_and_refresh() {
        let (svc, _, tokens) = service();
        let ctx = AuditContext::default();
        svc.register(register_request("dave@example.com"), &ctx).await.unwrap();

        let pair = svc
            .login(
                LoginRequest {
                    email: "dave@example.com".to_string(),
                    password: "correct-horse".to_string(),
                },
                &ctx,
            )
            .await
            .unwrap();

        let refreshed = svc
            .refresh(
                RefreshRequest {
                    refresh_token: pair.refresh_token.clone(),
                },
                &ctx,
            )
            .unwrap();
        // Fresh refresh token has ~30 days left: not rotated
        assert_eq!(refreshed.refresh_token, pair.refresh_token);
        assert_ne!(refreshed.access_token, pair.access_token);
        assert!(tokens.verify(&refreshed.access_token, TokenKind::Access).is_ok());

        let err = svc
            .refresh(
                RefreshRequest {
                    refresh_token: pair.access_token,
                },
                &ctx,
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}

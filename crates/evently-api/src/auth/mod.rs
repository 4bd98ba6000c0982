//! Authentication and authorization module
//!
//! - Token issuance, verification and rotation
//! - Password hashing with Argon2id
//! - Bearer authentication middleware and the role gate
//! - Registration, login and refresh

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{Payload, RefreshedTokens, TokenError, TokenKind, TokenManager};
pub use middleware::{
    authenticate, bearer_token, is_role_allowed, require_role, AuthContext, AuthError,
    MODERATOR_ROLES,
};
pub use password::{PasswordConfig, PasswordError, PasswordHasher};
pub use service::{
    normalize_email, AuthResponse, AuthService, LoginRequest, RefreshRequest, RegisterRequest,
};

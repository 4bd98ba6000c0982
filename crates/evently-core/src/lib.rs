//! Evently Core - Domain models, policies, and storage
//!
//! This crate defines the core abstractions used throughout Evently:
//! - Domain models (users, events, categories, reviews)
//! - Common error types
//! - Moderation state machine and event access policy
//! - Paging rules for listings
//! - Capability repository traits with PostgreSQL and in-memory stores
//! - Configuration management

pub mod config;
pub mod moderation;
pub mod paging;
pub mod postgres;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use moderation::{authorize_event_mutation, can_view_event, EventStatus, Visibility};
pub use paging::{
    CategoryPage, EventPage, Page, Paging, ParticipantPage, ReviewPage, UserPage, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use postgres::PgStore;
pub use repository::{
    CategoryRepository, EventRepository, Repositories, ReviewRepository, StoreHealth,
    UserRepository,
};

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Evently operations
#[derive(Error, Debug)]
pub enum EventlyError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: EventStatus, to: EventStatus },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EventlyError>;

// ============================================================================
// Users
// ============================================================================

/// Account role
///
/// `Admin` is the moderator role: it bypasses ownership checks and may
/// see and transition every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = EventlyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(EventlyError::ValidationError(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Credential record as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC string; never leaves the process
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub profile_picture_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public view of the account, without the credential
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            nickname: self.nickname.clone(),
            phone: self.phone.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Account as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub profile_picture_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Attendee of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    pub id: Uuid,
    pub nickname: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// Account to be inserted; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub profile_picture_url: Option<String>,
    pub role: UserRole,
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(nickname) = &self.nickname {
            user.nickname = Some(nickname.clone());
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(url) = &self.profile_picture_url {
            user.profile_picture_url = Some(url.clone());
        }
    }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub location: String,
    pub category: Category,
    pub participant_count: i32,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: EventStatus,
}

/// Event to be inserted. The status is not part of it: new events are
/// always stored as pending.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub creator_id: Uuid,
    pub location: String,
    pub category_id: Uuid,
    pub image_urls: Vec<String>,
}

/// Partial event update. Creator and status are deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the end date
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
    pub image_urls: Option<Vec<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.location.is_none()
            && self.category_id.is_none()
            && self.image_urls.is_none()
    }

    /// Apply to a fetched event. The category name is left for the store
    /// to resolve.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(start) = self.start_date {
            event.start_date = start;
        }
        if let Some(end) = self.end_date {
            event.end_date = end;
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(category_id) = self.category_id {
            event.category.id = category_id;
        }
        if let Some(urls) = &self.image_urls {
            event.image_urls = urls.clone();
        }
    }
}

/// End must be strictly after start when present
pub fn validate_time_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<()> {
    match end {
        Some(end) if end <= start => Err(EventlyError::ValidationError(
            "end_date must be after start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// Reviews
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub author_id: Uuid,
    pub event_id: Uuid,
    pub description: String,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub author_id: Uuid,
    pub event_id: Uuid,
    pub description: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("editor".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "ADMIN");
        assert!(UserRole::Admin.is_moderator());
        assert!(!UserRole::User.is_moderator());
    }

    #[test]
    fn test_role_serde_uses_uppercase() {
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
        let role: UserRole = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(role, UserRole::User);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            nickname: None,
            phone: None,
            profile_picture_url: None,
            role: UserRole::User,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn test_time_window() {
        let start = Utc::now();
        assert!(validate_time_window(start, None).is_ok());
        assert!(validate_time_window(start, Some(start + Duration::hours(1))).is_ok());
        assert!(validate_time_window(start, Some(start)).is_err());
        assert!(validate_time_window(start, Some(start - Duration::hours(1))).is_err());
    }

    #[test]
    fn test_event_patch_apply() {
        let category = Category {
            id: Uuid::new_v4(),
            name: "Music".to_string(),
        };
        let mut event = Event {
            id: Uuid::new_v4(),
            title: "Old".to_string(),
            description: String::new(),
            start_date: Utc::now(),
            end_date: None,
            creator_id: Uuid::new_v4(),
            location: "Hall".to_string(),
            category,
            participant_count: 0,
            image_urls: vec![],
            created_at: Utc::now(),
            status: EventStatus::Approved,
        };
        let patch = EventPatch {
            title: Some("New".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut event);
        assert_eq!(event.title, "New");
        assert_eq!(event.location, "Hall");
        assert_eq!(event.status, EventStatus::Approved);
        assert!(EventPatch::default().is_empty());
    }
}

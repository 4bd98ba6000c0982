//! Capability repository traits
//!
//! Each service depends only on the capabilities it uses. Both the
//! PostgreSQL store and the in-memory store implement every trait, and
//! [`Repositories`] bundles them behind trait objects.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    Category, Event, EventPatch, EventStatus, NewEvent, NewReview, NewUser, Paging,
    Participant, ProfileUpdate, Result, Review, User, UserRole, Visibility,
};

/// Account persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert an account. A taken email yields `AlreadyExists`.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply a partial profile update and return the stored record
    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> Result<User>;

    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<User>;

    /// Delete an account together with its events, attendance and reviews
    async fn delete_user(&self, id: Uuid) -> Result<()>;
}

/// Events and attendance
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert an event as pending. A missing category yields `ValidationError`.
    async fn create_event(&self, event: &NewEvent) -> Result<Event>;

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>>;

    /// Creator lookup used before ownership checks
    async fn event_creator(&self, id: Uuid) -> Result<Option<Uuid>>;

    /// Page of events filtered by visibility, with the total under the same filter
    async fn list_events(&self, visibility: Visibility, paging: &Paging) -> Result<(Vec<Event>, i64)>;

    async fn list_events_by_creator(&self, creator_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)>;

    async fn list_attended_events(&self, user_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)>;

    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<Event>;

    async fn delete_event(&self, id: Uuid) -> Result<()>;

    /// Compare-and-set on the status column. Returns `false` when the event
    /// is no longer in `expected`.
    async fn update_event_status(&self, id: Uuid, expected: EventStatus, target: EventStatus) -> Result<bool>;

    /// Record attendance and bump the participant count atomically.
    /// Returns `false` if the user already attends.
    async fn add_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Returns `false` if the user was not attending
    async fn remove_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn list_participants(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Participant>, i64)>;
}

/// Category reference data
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;

    async fn create_category(&self, name: &str) -> Result<Category>;

    async fn update_category(&self, id: Uuid, name: &str) -> Result<Category>;

    /// Fails with `Conflict` while events still reference the category
    async fn delete_category(&self, id: Uuid) -> Result<()>;
}

/// Append-only reviews
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create_review(&self, review: &NewReview) -> Result<Review>;

    async fn list_reviews(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Review>, i64)>;
}

/// Readiness probe for the backing store
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// All capabilities of one backing store
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + EventRepository
            + CategoryRepository
            + ReviewRepository
            + StoreHealth
            + 'static,
    {
        Self {
            users: store.clone(),
            events: store.clone(),
            categories: store.clone(),
            reviews: store.clone(),
            health: store,
        }
    }
}

//! Application state management

use crate::auth::{AuthService, PasswordHasher, TokenManager};
use crate::middleware::Metrics;
use crate::services::{CategoryService, EventService, ModerationService, ReviewService, UserService};
use evently_core::{AppConfig, Repositories};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
///
/// Everything here is immutable after startup except the metric values.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Storage capabilities
    pub repos: Repositories,
    /// Token issuance and verification, keyed by the configured secrets
    pub tokens: Arc<TokenManager>,
    pub hasher: PasswordHasher,
    pub metrics: Metrics,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repos: Repositories,
        hasher: PasswordHasher,
    ) -> Result<Self, prometheus::Error> {
        let tokens = Arc::new(TokenManager::new(&config.auth));
        Ok(Self {
            config,
            repos,
            tokens,
            hasher,
            metrics: Metrics::new()?,
            start_time: Instant::now(),
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.repos.users.clone(), self.hasher.clone(), self.tokens.clone())
    }

    pub fn event_service(&self) -> EventService {
        EventService::new(self.repos.events.clone())
    }

    pub fn moderation_service(&self) -> ModerationService {
        ModerationService::new(self.repos.events.clone())
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.repos.users.clone(), self.repos.events.clone(), self.hasher.clone())
    }

    pub fn category_service(&self) -> CategoryService {
        CategoryService::new(self.repos.categories.clone())
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(self.repos.events.clone(), self.repos.reviews.clone())
    }
}

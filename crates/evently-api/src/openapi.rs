//! OpenAPI document served at `/api-docs/openapi.json`

use crate::auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};
use crate::error::ApiError;
use crate::handlers::{auth, categories, events, health, moderation, reviews, users};
use crate::services::{
    AdminUpdateUserRequest, CategoryRequest, CreateEventRequest, CreateReviewRequest,
    CreateUserRequest, ModerateEventRequest, UpdateEventRequest, UpdateProfileRequest,
};
use evently_core::{
    Category, Event, EventPage, EventStatus, Participant, ParticipantPage, Review, ReviewPage,
    UserProfile, UserRole,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Evently API",
        description = "Event management backend with moderation and role-based access"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics_handler,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        events::create_event,
        events::list_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::list_participants,
        events::attend_event,
        events::cancel_attendance,
        reviews::list_reviews,
        reviews::create_review,
        users::get_me,
        users::update_me,
        users::delete_me,
        users::created_events,
        users::attended_events,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        moderation::moderate_event,
        moderation::create_user,
        moderation::get_user,
        moderation::update_user,
        moderation::delete_user,
    ),
    components(schemas(
        ApiError,
        AuthResponse,
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        UserRole,
        UserProfile,
        UpdateProfileRequest,
        CreateUserRequest,
        AdminUpdateUserRequest,
        EventStatus,
        Event,
        EventPage,
        CreateEventRequest,
        UpdateEventRequest,
        ModerateEventRequest,
        Participant,
        ParticipantPage,
        Category,
        CategoryRequest,
        Review,
        ReviewPage,
        CreateReviewRequest,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "events", description = "Events and their participants"),
        (name = "attendance", description = "Joining and leaving events"),
        (name = "reviews", description = "Reviews of approved events"),
        (name = "users", description = "The caller's own account"),
        (name = "categories", description = "Event categories"),
        (name = "moderation", description = "Moderator-only operations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_protected_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/events/{id}"));
        assert!(doc.paths.paths.contains_key("/api/moderation/events/{id}"));
        assert!(doc.paths.paths.contains_key("/auth/register"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

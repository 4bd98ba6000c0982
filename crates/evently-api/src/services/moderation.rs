//! Moderation decisions on events

use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthContext;
use crate::error::AppError;
use evently_core::{Event, EventRepository, EventStatus};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Target status chosen by the moderator
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ModerateEventRequest {
    pub status: EventStatus,
}

pub struct ModerationService {
    events: Arc<dyn EventRepository>,
}

impl ModerationService {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    /// Move a pending event to `target` and return it as stored.
    ///
    /// The write only succeeds if the status is still the one that was
    /// validated; a concurrent decision surfaces as a conflict.
    pub async fn check_event(
        &self,
        moderator: AuthContext,
        event_id: Uuid,
        target: EventStatus,
    ) -> Result<Event, AppError> {
        let current = self
            .events
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))?;

        current.status.transition_to(target)?;

        if !self
            .events
            .update_event_status(event_id, current.status, target)
            .await?
        {
            return Err(AppError::Conflict(
                "Event was moderated concurrently".to_string(),
            ));
        }

        audit_log(&AuditEvent::EventModerated {
            moderator_id: moderator.user_id,
            event_id,
            from: current.status,
            to: target,
        });

        self.events
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))
    }
}

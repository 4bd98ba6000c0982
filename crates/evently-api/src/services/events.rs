//! Event service: creation, reads under the visibility rule, owner-only
//! mutation and attendance.

use crate::auth::AuthContext;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use evently_core::{
    authorize_event_mutation, can_view_event, validate_time_window, Event, EventPatch,
    EventRepository, EventStatus, NewEvent, Page, Paging, Participant, Visibility,
};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// New event. The creator is the caller; the status always starts `pending`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub location: String,
    pub category_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 images"))]
    pub image_urls: Vec<String>,
}

/// Partial event update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// `null` removes the end date
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(length(max = 20, message = "at most 20 images"))]
    pub image_urls: Option<Vec<String>>,
}

/// A present field, `null` included, becomes `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateEventRequest> for EventPatch {
    fn from(req: UpdateEventRequest) -> Self {
        EventPatch {
            title: req.title,
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
            location: req.location,
            category_id: req.category_id,
            image_urls: req.image_urls,
        }
    }
}

pub struct EventService {
    events: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    pub async fn create(&self, actor: AuthContext, req: CreateEventRequest) -> Result<Event, AppError> {
        validate_time_window(req.start_date, req.end_date)?;

        let event = self
            .events
            .create_event(&NewEvent {
                title: req.title,
                description: req.description,
                start_date: req.start_date,
                end_date: req.end_date,
                creator_id: actor.user_id,
                location: req.location,
                category_id: req.category_id,
                image_urls: req.image_urls,
            })
            .await?;

        tracing::info!(event_id = %event.id, creator_id = %actor.user_id, "Event created");
        Ok(event)
    }

    /// Fetch an event the caller may see. Hidden events are reported as
    /// missing.
    pub async fn get(&self, actor: AuthContext, id: Uuid) -> Result<Event, AppError> {
        match self.events.get_event(id).await? {
            Some(event) if can_view_event(&event, actor.user_id, actor.role) => Ok(event),
            _ => Err(AppError::not_found("Event")),
        }
    }

    pub async fn list(&self, actor: AuthContext, paging: Paging) -> Result<Page<Event>, AppError> {
        let (items, total) = self
            .events
            .list_events(Visibility::for_role(actor.role), &paging)
            .await?;
        Ok(Page::new(items, total, &paging))
    }

    /// Creator lookup and ownership check. A refusal is indistinguishable
    /// from a missing event.
    async fn authorize_mutation(&self, actor: AuthContext, id: Uuid) -> Result<(), AppError> {
        let creator_id = self
            .events
            .event_creator(id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))?;

        authorize_event_mutation(creator_id, actor.user_id, actor.is_moderator()).map_err(|e| {
            tracing::debug!(event_id = %id, actor_id = %actor.user_id, reason = %e, "Event mutation refused");
            AppError::not_found("Event")
        })
    }

    pub async fn update(&self, actor: AuthContext, id: Uuid, req: UpdateEventRequest) -> Result<Event, AppError> {
        self.authorize_mutation(actor, id).await?;

        let patch = EventPatch::from(req);
        let mut merged = self
            .events
            .get_event(id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))?;
        if patch.is_empty() {
            return Ok(merged);
        }

        patch.apply_to(&mut merged);
        validate_time_window(merged.start_date, merged.end_date)?;

        Ok(self.events.update_event(id, &patch).await?)
    }

    pub async fn delete(&self, actor: AuthContext, id: Uuid) -> Result<(), AppError> {
        self.authorize_mutation(actor, id).await?;
        self.events.delete_event(id).await?;
        tracing::info!(event_id = %id, actor_id = %actor.user_id, "Event deleted");
        Ok(())
    }

    pub async fn participants(
        &self,
        actor: AuthContext,
        id: Uuid,
        paging: Paging,
    ) -> Result<Page<Participant>, AppError> {
        self.get(actor, id).await?;
        let (items, total) = self.events.list_participants(id, &paging).await?;
        Ok(Page::new(items, total, &paging))
    }

    /// Join an approved event. Attending twice is a conflict.
    pub async fn attend(&self, actor: AuthContext, id: Uuid) -> Result<(), AppError> {
        let event = self.get(actor, id).await?;
        if event.status != EventStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Event is {} and does not accept attendees",
                event.status
            )));
        }

        if !self.events.add_participant(id, actor.user_id).await? {
            return Err(AppError::Conflict("Already attending this event".to_string()));
        }
        Ok(())
    }

    pub async fn cancel_attendance(&self, actor: AuthContext, id: Uuid) -> Result<(), AppError> {
        self.get(actor, id).await?;
        if !self.events.remove_participant(id, actor.user_id).await? {
            return Err(AppError::not_found("Attendance"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use evently_core::{CategoryRepository, MemoryStore, NewUser, UserRepository, UserRole};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: EventService,
        category_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let category = store.create_category("Music").await.unwrap();
        Fixture {
            service: EventService::new(store.clone()),
            store,
            category_id: category.id,
        }
    }

    async fn user(store: &MemoryStore, email: &str, role: UserRole) -> AuthContext {
        let user = store
            .create_user(&NewUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                nickname: None,
                phone: None,
                profile_picture_url: None,
                role,
            })
            .await
            .unwrap();
        AuthContext {
            user_id: user.id,
            role,
        }
    }

    fn request(category_id: Uuid) -> CreateEventRequest {
        let start = Utc::now() + Duration::days(7);
        CreateEventRequest {
            title: "Jazz night".to_string(),
            description: "Live music".to_string(),
            start_date: start,
            end_date: Some(start + Duration::hours(3)),
            location: "Hall A".to_string(),
            category_id,
            image_urls: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending_and_is_hidden_from_others() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;
        let other = user(&f.store, "other@example.com", UserRole::User).await;
        let admin = user(&f.store, "admin@example.com", UserRole::Admin).await;

        let event = f.service.create(owner, request(f.category_id)).await.unwrap();
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.creator_id, owner.user_id);

        assert!(f.service.get(owner, event.id).await.is_ok());
        assert!(f.service.get(admin, event.id).await.is_ok());
        assert!(matches!(
            f.service.get(other, event.id).await,
            Err(AppError::NotFound(_))
        ));

        assert_eq!(f.service.list(other, Paging::default()).await.unwrap().total, 0);
        assert_eq!(f.service.list(admin, Paging::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_window() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;

        let mut req = request(f.category_id);
        req.end_date = Some(req.start_date);
        assert!(matches!(
            f.service.create(owner, req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_update_request_distinguishes_null_end_date() {
        let absent: UpdateEventRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.end_date, None);

        let cleared: UpdateEventRequest = serde_json::from_str(r#"{"end_date":null}"#).unwrap();
        assert_eq!(cleared.end_date, Some(None));

        let set: UpdateEventRequest =
            serde_json::from_str(r#"{"end_date":"2030-05-01T21:00:00Z"}"#).unwrap();
        assert!(matches!(set.end_date, Some(Some(_))));
    }

    #[tokio::test]
    async fn test_owner_can_clear_end_date() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;
        let event = f.service.create(owner, request(f.category_id)).await.unwrap();
        assert!(event.end_date.is_some());

        let kept = f
            .service
            .update(
                owner,
                event.id,
                UpdateEventRequest {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.end_date, event.end_date);

        let cleared = f
            .service
            .update(
                owner,
                event.id,
                UpdateEventRequest {
                    end_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.end_date, None);
    }

    #[tokio::test]
    async fn test_non_owner_mutation_is_not_found() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;
        let other = user(&f.store, "other@example.com", UserRole::User).await;
        let admin = user(&f.store, "admin@example.com", UserRole::Admin).await;
        let event = f.service.create(owner, request(f.category_id)).await.unwrap();

        let patch = UpdateEventRequest {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(other, event.id, patch.clone()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.delete(other, event.id).await,
            Err(AppError::NotFound(_))
        ));

        let updated = f.service.update(admin, event.id, patch).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        f.service.delete(owner, event.id).await.unwrap();
        assert!(f.store.get_event(event.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_validates_merged_window() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;
        let event = f.service.create(owner, request(f.category_id)).await.unwrap();

        let patch = UpdateEventRequest {
            start_date: Some(event.start_date + Duration::days(1)),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(owner, event.id, patch).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_attendance_lifecycle() {
        let f = fixture().await;
        let owner = user(&f.store, "owner@example.com", UserRole::User).await;
        let guest = user(&f.store, "guest@example.com", UserRole::User).await;
        let event = f.service.create(owner, request(f.category_id)).await.unwrap();

        // Pending events take no attendees, even from their creator
        assert!(matches!(
            f.service.attend(owner, event.id).await,
            Err(AppError::Conflict(_))
        ));

        f.store
            .update_event_status(event.id, EventStatus::Pending, EventStatus::Approved)
            .await
            .unwrap();

        f.service.attend(guest, event.id).await.unwrap();
        assert!(matches!(
            f.service.attend(guest, event.id).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(f.service.get(guest, event.id).await.unwrap().participant_count, 1);

        let participants = f
            .service
            .participants(owner, event.id, Paging::default())
            .await
            .unwrap();
        assert_eq!(participants.total, 1);
        assert_eq!(participants.items[0].id, guest.user_id);

        f.service.cancel_attendance(guest, event.id).await.unwrap();
        assert!(matches!(
            f.service.cancel_attendance(guest, event.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(f.service.get(guest, event.id).await.unwrap().participant_count, 0);
    }
}

//! Reviews on approved events

use crate::auth::AuthContext;
use crate::error::AppError;
use evently_core::{
    can_view_event, Event, EventRepository, EventStatus, NewReview, Page, Paging, Review,
    ReviewRepository,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReviewRequest {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    /// 1.0 to 5.0
    #[validate(range(min = 1.0, max = 5.0, message = "must be between 1 and 5"))]
    pub score: f32,
}

pub struct ReviewService {
    events: Arc<dyn EventRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl ReviewService {
    pub fn new(events: Arc<dyn EventRepository>, reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { events, reviews }
    }

    async fn visible_event(&self, actor: AuthContext, event_id: Uuid) -> Result<Event, AppError> {
        match self.events.get_event(event_id).await? {
            Some(event) if can_view_event(&event, actor.user_id, actor.role) => Ok(event),
            _ => Err(AppError::not_found("Event")),
        }
    }

    pub async fn list(&self, actor: AuthContext, event_id: Uuid, paging: Paging) -> Result<Page<Review>, AppError> {
        self.visible_event(actor, event_id).await?;
        let (items, total) = self.reviews.list_reviews(event_id, &paging).await?;
        Ok(Page::new(items, total, &paging))
    }

    pub async fn create(
        &self,
        actor: AuthContext,
        event_id: Uuid,
        req: CreateReviewRequest,
    ) -> Result<Review, AppError> {
        let event = self.visible_event(actor, event_id).await?;
        if event.status != EventStatus::Approved {
            return Err(AppError::Conflict(format!(
                "Event is {} and cannot be reviewed",
                event.status
            )));
        }

        Ok(self
            .reviews
            .create_review(&NewReview {
                author_id: actor.user_id,
                event_id,
                description: req.description,
                score: req.score,
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evently_core::{CategoryRepository, MemoryStore, NewEvent, UserRole};

    async fn setup() -> (Arc<MemoryStore>, ReviewService, Event) {
        let store = Arc::new(MemoryStore::new());
        let category = store.create_category("Food").await.unwrap();
        let event = store
            .create_event(&NewEvent {
                title: "Tasting".to_string(),
                description: String::new(),
                start_date: Utc::now(),
                end_date: None,
                creator_id: Uuid::new_v4(),
                location: "Market".to_string(),
                category_id: category.id,
                image_urls: vec![],
            })
            .await
            .unwrap();
        (store.clone(), ReviewService::new(store.clone(), store), event)
    }

    fn reviewer() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role: UserRole::User,
        }
    }

    fn review(score: f32) -> CreateReviewRequest {
        CreateReviewRequest {
            description: "Great".to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn test_pending_event_hidden_from_reviewers() {
        let (_, service, event) = setup().await;
        assert!(matches!(
            service.create(reviewer(), event.id, review(4.0)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_review_approved_event() {
        let (store, service, event) = setup().await;
        store
            .update_event_status(event.id, EventStatus::Pending, EventStatus::Approved)
            .await
            .unwrap();

        let actor = reviewer();
        let created = service.create(actor, event.id, review(4.5)).await.unwrap();
        assert_eq!(created.author_id, actor.user_id);

        let page = service.list(actor, event.id, Paging::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, created.id);
    }

    #[test]
    fn test_score_bounds() {
        assert!(review(1.0).validate().is_ok());
        assert!(review(5.0).validate().is_ok());
        assert!(review(0.5).validate().is_err());
        assert!(review(5.5).validate().is_err());
    }
}

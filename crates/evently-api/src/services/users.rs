//! Self-service profile operations and moderator user management

use crate::audit::{audit_log, AuditEvent};
use crate::auth::{normalize_email, AuthContext, PasswordHasher};
use crate::error::AppError;
use evently_core::{
    Event, EventRepository, NewUser, Page, Paging, ProfileUpdate, UserProfile, UserRepository,
    UserRole,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Profile changes a user may make to their own account. There is no role
/// field: the role is not self-service.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub profile_picture_url: Option<String>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            email: self.email.as_deref().map(normalize_email),
            nickname: self.nickname,
            phone: self.phone,
            profile_picture_url: self.profile_picture_url,
        }
    }
}

/// Account created by a moderator
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
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
    #[serde(default)]
    pub role: UserRole,
}

/// Moderator update of any account, role included
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AdminUpdateUserRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: UpdateProfileRequest,
    pub role: Option<UserRole>,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventRepository>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, events: Arc<dyn EventRepository>, hasher: PasswordHasher) -> Self {
        Self { users, events, hasher }
    }

    pub async fn get(&self, id: Uuid) -> Result<UserProfile, AppError> {
        self.users
            .find_user_by_id(id)
            .await?
            .map(|u| u.profile())
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn me(&self, actor: AuthContext) -> Result<UserProfile, AppError> {
        self.get(actor.user_id).await
    }

    pub async fn update_me(&self, actor: AuthContext, req: UpdateProfileRequest) -> Result<UserProfile, AppError> {
        let user = self.users.update_user(actor.user_id, &req.into_update()).await?;
        Ok(user.profile())
    }

    pub async fn delete_me(&self, actor: AuthContext) -> Result<(), AppError> {
        self.users.delete_user(actor.user_id).await?;
        tracing::info!(user_id = %actor.user_id, "Account deleted by owner");
        Ok(())
    }

    /// Events the caller created, in every moderation state
    pub async fn created_events(&self, actor: AuthContext, paging: Paging) -> Result<Page<Event>, AppError> {
        let (items, total) = self.events.list_events_by_creator(actor.user_id, &paging).await?;
        Ok(Page::new(items, total, &paging))
    }

    pub async fn attended_events(&self, actor: AuthContext, paging: Paging) -> Result<Page<Event>, AppError> {
        let (items, total) = self.events.list_attended_events(actor.user_id, &paging).await?;
        Ok(Page::new(items, total, &paging))
    }

    pub async fn create_user(&self, moderator: AuthContext, req: CreateUserRequest) -> Result<UserProfile, AppError> {
        let email = normalize_email(&req.email);
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists("User with this email already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        let user = self
            .users
            .create_user(&NewUser {
                email,
                password_hash,
                nickname: req.nickname,
                phone: req.phone,
                profile_picture_url: req.profile_picture_url,
                role: req.role,
            })
            .await?;

        audit_log(&AuditEvent::RoleChanged {
            actor_id: Some(moderator.user_id),
            user_id: user.id,
            role: user.role,
        });
        Ok(user.profile())
    }

    pub async fn update_user(
        &self,
        moderator: AuthContext,
        id: Uuid,
        req: AdminUpdateUserRequest,
    ) -> Result<UserProfile, AppError> {
        let mut user = self.users.update_user(id, &req.profile.into_update()).await?;

        if let Some(role) = req.role.filter(|r| *r != user.role) {
            user = self.users.set_user_role(id, role).await?;
            audit_log(&AuditEvent::RoleChanged {
                actor_id: Some(moderator.user_id),
                user_id: id,
                role,
            });
        }
        Ok(user.profile())
    }

    pub async fn delete_user(&self, moderator: AuthContext, id: Uuid) -> Result<(), AppError> {
        self.users.delete_user(id).await?;
        tracing::info!(user_id = %id, moderator_id = %moderator.user_id, "Account deleted by moderator");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordConfig;
    use evently_core::MemoryStore;

    fn service() -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new(PasswordConfig::light()).unwrap();
        (store.clone(), UserService::new(store.clone(), store, hasher))
    }

    fn moderator() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
        }
    }

    fn create_request(email: &str, role: UserRole) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "long-enough-password".to_string(),
            nickname: None,
            phone: None,
            profile_picture_url: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_moderator_creates_and_promotes() {
        let (_, service) = service();

        let created = service
            .create_user(moderator(), create_request("Eve@Example.com", UserRole::User))
            .await
            .unwrap();
        assert_eq!(created.email, "eve@example.com");
        assert_eq!(created.role, UserRole::User);

        let promoted = service
            .update_user(
                moderator(),
                created.id,
                AdminUpdateUserRequest {
                    role: Some(UserRole::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(promoted.role, UserRole::Admin);

        assert!(matches!(
            service
                .create_user(moderator(), create_request("eve@example.com", UserRole::User))
                .await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_self_service_profile() {
        let (_, service) = service();
        let created = service
            .create_user(moderator(), create_request("frank@example.com", UserRole::User))
            .await
            .unwrap();
        let actor = AuthContext {
            user_id: created.id,
            role: created.role,
        };

        let updated = service
            .update_me(
                actor,
                UpdateProfileRequest {
                    nickname: Some("Frankie".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.nickname.as_deref(), Some("Frankie"));
        assert_eq!(updated.role, UserRole::User);

        service.delete_me(actor).await.unwrap();
        assert!(matches!(service.me(actor).await, Err(AppError::NotFound(_))));
    }
}

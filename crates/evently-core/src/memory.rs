//! In-memory store for tests
//!
//! Mirrors the PostgreSQL store's constraint behaviour (unique email and
//! category name, restricted category deletes, cascading user deletes) so
//! services can be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

use crate::repository::{
    CategoryRepository, EventRepository, ReviewRepository, StoreHealth, UserRepository,
};
use crate::{
    Category, Event, EventPatch, EventStatus, EventlyError, NewEvent, NewReview, NewUser, Paging,
    Participant, ProfileUpdate, Result, Review, User, UserRole, Visibility,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    categories: HashMap<Uuid, Category>,
    /// (event_id, user_id)
    participants: BTreeSet<(Uuid, Uuid)>,
    reviews: Vec<Review>,
}

/// Process-local store guarded by a single lock
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| EventlyError::DatabaseError("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| EventlyError::DatabaseError("memory store lock poisoned".to_string()))
    }
}

fn page_of<T: Clone>(items: &[T], paging: &Paging) -> Vec<T> {
    items
        .iter()
        .skip(paging.offset() as usize)
        .take(paging.limit() as usize)
        .cloned()
        .collect()
}

fn sorted_events<'a>(events: impl Iterator<Item = &'a Event>) -> Vec<Event> {
    let mut events: Vec<Event> = events.cloned().collect();
    events.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
    events
}

fn paged_events<'a>(events: impl Iterator<Item = &'a Event>, paging: &Paging) -> (Vec<Event>, i64) {
    let all = sorted_events(events);
    (page_of(&all, paging), all.len() as i64)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(EventlyError::AlreadyExists("User with this email".to_string()));
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            nickname: user.nickname.clone(),
            phone: user.phone.clone(),
            profile_picture_url: user.profile_picture_url.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> Result<User> {
        let mut state = self.write()?;
        if let Some(email) = &update.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(EventlyError::AlreadyExists("User with this email".to_string()));
            }
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| EventlyError::NotFound("User".to_string()))?;
        update.apply_to(user);
        Ok(user.clone())
    }

    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<User> {
        let mut state = self.write()?;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| EventlyError::NotFound("User".to_string()))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut state = self.write()?;
        if state.users.remove(&id).is_none() {
            return Err(EventlyError::NotFound("User".to_string()));
        }

        let attended: Vec<Uuid> = state
            .participants
            .iter()
            .filter(|(_, user_id)| *user_id == id)
            .map(|(event_id, _)| *event_id)
            .collect();
        for event_id in attended {
            state.participants.remove(&(event_id, id));
            if let Some(event) = state.events.get_mut(&event_id) {
                event.participant_count -= 1;
            }
        }

        let owned: Vec<Uuid> = state
            .events
            .values()
            .filter(|e| e.creator_id == id)
            .map(|e| e.id)
            .collect();
        for event_id in owned {
            state.events.remove(&event_id);
            state.participants.retain(|(e, _)| *e != event_id);
            state.reviews.retain(|r| r.event_id != event_id);
        }
        state.reviews.retain(|r| r.author_id != id);
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create_event(&self, event: &NewEvent) -> Result<Event> {
        let mut state = self.write()?;
        let category = state
            .categories
            .get(&event.category_id)
            .cloned()
            .ok_or_else(|| EventlyError::ValidationError("category does not exist".to_string()))?;

        let record = Event {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            description: event.description.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            creator_id: event.creator_id,
            location: event.location.clone(),
            category,
            participant_count: 0,
            image_urls: event.image_urls.clone(),
            created_at: Utc::now(),
            status: EventStatus::Pending,
        };
        state.events.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.read()?.events.get(&id).cloned())
    }

    async fn event_creator(&self, id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.read()?.events.get(&id).map(|e| e.creator_id))
    }

    async fn list_events(&self, visibility: Visibility, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let state = self.read()?;
        Ok(paged_events(
            state.events.values().filter(|e| visibility.includes(e.status)),
            paging,
        ))
    }

    async fn list_events_by_creator(&self, creator_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let state = self.read()?;
        Ok(paged_events(
            state.events.values().filter(|e| e.creator_id == creator_id),
            paging,
        ))
    }

    async fn list_attended_events(&self, user_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let state = self.read()?;
        Ok(paged_events(
            state
                .events
                .values()
                .filter(|e| state.participants.contains(&(e.id, user_id))),
            paging,
        ))
    }

    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<Event> {
        let mut state = self.write()?;
        let category = match patch.category_id {
            Some(category_id) => Some(
                state
                    .categories
                    .get(&category_id)
                    .cloned()
                    .ok_or_else(|| EventlyError::ValidationError("category does not exist".to_string()))?,
            ),
            None => None,
        };

        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| EventlyError::NotFound("Event".to_string()))?;
        patch.apply_to(event);
        if let Some(category) = category {
            event.category = category;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<()> {
        let mut state = self.write()?;
        if state.events.remove(&id).is_none() {
            return Err(EventlyError::NotFound("Event".to_string()));
        }
        state.participants.retain(|(e, _)| *e != id);
        state.reviews.retain(|r| r.event_id != id);
        Ok(())
    }

    async fn update_event_status(&self, id: Uuid, expected: EventStatus, target: EventStatus) -> Result<bool> {
        let mut state = self.write()?;
        match state.events.get_mut(&id) {
            Some(event) if event.status == expected => {
                event.status = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut state = self.write()?;
        if !state.events.contains_key(&event_id) || !state.users.contains_key(&user_id) {
            return Err(EventlyError::Conflict("Attendance is referenced by other records".to_string()));
        }
        if !state.participants.insert((event_id, user_id)) {
            return Ok(false);
        }
        if let Some(event) = state.events.get_mut(&event_id) {
            event.participant_count += 1;
        }
        Ok(true)
    }

    async fn remove_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut state = self.write()?;
        if !state.participants.remove(&(event_id, user_id)) {
            return Ok(false);
        }
        if let Some(event) = state.events.get_mut(&event_id) {
            event.participant_count -= 1;
        }
        Ok(true)
    }

    async fn list_participants(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Participant>, i64)> {
        let state = self.read()?;
        let mut users: Vec<&User> = state
            .participants
            .iter()
            .filter(|(e, _)| *e == event_id)
            .filter_map(|(_, u)| state.users.get(u))
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let participants: Vec<Participant> = users
            .into_iter()
            .map(|u| Participant {
                id: u.id,
                nickname: u.nickname.clone(),
                profile_picture_url: u.profile_picture_url.clone(),
            })
            .collect();
        let total = participants.len() as i64;
        Ok((page_of(&participants, paging), total))
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self.read()?.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut state = self.write()?;
        if state.categories.values().any(|c| c.name == name) {
            return Err(EventlyError::AlreadyExists("Category".to_string()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, name: &str) -> Result<Category> {
        let mut state = self.write()?;
        if state.categories.values().any(|c| c.id != id && c.name == name) {
            return Err(EventlyError::AlreadyExists("Category".to_string()));
        }
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| EventlyError::NotFound("Category".to_string()))?;
        category.name = name.to_string();
        let updated = category.clone();

        for event in state.events.values_mut() {
            if event.category.id == id {
                event.category.name = updated.name.clone();
            }
        }
        Ok(updated)
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        let mut state = self.write()?;
        if state.events.values().any(|e| e.category.id == id) {
            return Err(EventlyError::Conflict(
                "Category is referenced by other records".to_string(),
            ));
        }
        if state.categories.remove(&id).is_none() {
            return Err(EventlyError::NotFound("Category".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review> {
        let mut state = self.write()?;
        if !state.events.contains_key(&review.event_id) {
            return Err(EventlyError::Conflict("Review is referenced by other records".to_string()));
        }
        let record = Review {
            id: Uuid::new_v4(),
            author_id: review.author_id,
            event_id: review.event_id,
            description: review.description.clone(),
            score: review.score,
            created_at: Utc::now(),
        };
        state.reviews.push(record.clone());
        Ok(record)
    }

    async fn list_reviews(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Review>, i64)> {
        let state = self.read()?;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = reviews.len() as i64;
        Ok((page_of(&reviews, paging), total))
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            nickname: None,
            phone: None,
            profile_picture_url: None,
            role: UserRole::User,
        }
    }

    async fn seed_event(store: &MemoryStore, creator_id: Uuid) -> Event {
        let category = store.create_category(&Uuid::new_v4().to_string()).await.unwrap();
        store
            .create_event(&NewEvent {
                title: "Concert".to_string(),
                description: String::new(),
                start_date: Utc::now() + Duration::days(1),
                end_date: None,
                creator_id,
                location: "Park".to_string(),
                category_id: category.id,
                image_urls: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unique_email() {
        let store = MemoryStore::new();
        store.create_user(&new_user("a@example.com")).await.unwrap();
        let err = store.create_user(&new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, EventlyError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_listing_respects_visibility() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("c@example.com")).await.unwrap();
        let pending = seed_event(&store, user.id).await;
        let approved = seed_event(&store, user.id).await;
        assert!(store
            .update_event_status(approved.id, EventStatus::Pending, EventStatus::Approved)
            .await
            .unwrap());

        let paging = Paging::default();
        let (public, total) = store.list_events(Visibility::ApprovedOnly, &paging).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(public[0].id, approved.id);

        let (all, total) = store.list_events(Visibility::All, &paging).await.unwrap();
        assert_eq!(total, 2);
        assert!(all.iter().any(|e| e.id == pending.id));
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("d@example.com")).await.unwrap();
        let event = seed_event(&store, user.id).await;
        assert!(store
            .update_event_status(event.id, EventStatus::Pending, EventStatus::Rejected)
            .await
            .unwrap());
        assert!(!store
            .update_event_status(event.id, EventStatus::Pending, EventStatus::Approved)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_attendance_counts() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("e@example.com")).await.unwrap();
        let event = seed_event(&store, user.id).await;

        assert!(store.add_participant(event.id, user.id).await.unwrap());
        assert!(!store.add_participant(event.id, user.id).await.unwrap());
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().participant_count, 1);

        assert!(store.remove_participant(event.id, user.id).await.unwrap());
        assert!(!store.remove_participant(event.id, user.id).await.unwrap());
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().participant_count, 0);
    }

    #[tokio::test]
    async fn test_referenced_category_cannot_be_deleted() {
        let store = MemoryStore::new();
        let user = store.create_user(&new_user("f@example.com")).await.unwrap();
        let event = seed_event(&store, user.id).await;
        let err = store.delete_category(event.category.id).await.unwrap_err();
        assert!(matches!(err, EventlyError::Conflict(_)));
    }
}

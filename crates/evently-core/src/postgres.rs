//! PostgreSQL store
//!
//! Implements every capability repository over a single `sqlx` pool.
//! Constraint violations are mapped onto domain errors; everything else
//! surfaces as `DatabaseError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::{
    CategoryRepository, EventRepository, ReviewRepository, StoreHealth, UserRepository,
};
use crate::{
    Category, DatabaseConfig, Event, EventPatch, EventStatus, EventlyError, NewEvent, NewReview,
    NewUser, Paging, Participant, ProfileUpdate, Result, Review, User, UserRole, Visibility,
};

/// Prefixes a query tail with the event projection (events joined to categories)
macro_rules! event_query {
    ($tail:literal) => {
        concat!(
            "SELECT e.id, e.title, e.description, e.start_date, e.end_date, e.creator_id, ",
            "e.location, e.category_id, c.name AS category_name, e.participant_count, ",
            "e.image_urls, e.created_at, e.status ",
            "FROM events e JOIN categories c ON c.id = e.category_id ",
            $tail
        )
    };
}

const USER_COLUMNS: &str =
    "id, email, password_hash, nickname, phone, profile_picture_url, role, created_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a bounded pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url())
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            host = %config.host,
            database = %config.name,
            "PostgreSQL pool ready"
        );

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Migration failed: {e}")))
    }

    /// Wait for checked-out connections to return, then close the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn map_db_error(err: sqlx::Error, what: &str) -> EventlyError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return EventlyError::AlreadyExists(what.to_string());
        }
        if db.is_foreign_key_violation() {
            return EventlyError::Conflict(format!("{what} is referenced by other records"));
        }
    }
    EventlyError::DatabaseError(format!("{what}: {err}"))
}

/// Event writes only reference categories and users; a dangling category
/// is a caller error.
fn map_event_write_error(err: sqlx::Error) -> EventlyError {
    match err.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => {
            EventlyError::ValidationError("category does not exist".to_string())
        }
        Some(db) if db.is_check_violation() => {
            EventlyError::ValidationError("end_date must be after start_date".to_string())
        }
        _ => EventlyError::DatabaseError(format!("Failed to write event: {err}")),
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    nickname: Option<String>,
    phone: Option<String>,
    profile_picture_url: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = EventlyError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            nickname: row.nickname,
            phone: row.phone,
            profile_picture_url: row.profile_picture_url,
            role: row
                .role
                .parse()
                .map_err(|_| EventlyError::DatabaseError(format!("corrupt role '{}'", row.role)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    creator_id: Uuid,
    location: String,
    category_id: Uuid,
    category_name: String,
    participant_count: i32,
    image_urls: Vec<String>,
    created_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<EventRow> for Event {
    type Error = EventlyError;

    fn try_from(row: EventRow) -> Result<Self> {
        let status: EventStatus = row
            .status
            .parse()
            .map_err(|_| EventlyError::DatabaseError(format!("corrupt status '{}'", row.status)))?;

        Ok(Event {
            id: row.id,
            title: row.title,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            creator_id: row.creator_id,
            location: row.location,
            category: Category {
                id: row.category_id,
                name: row.category_name,
            },
            participant_count: row.participant_count,
            image_urls: row.image_urls,
            created_at: row.created_at,
            status,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<Event>> {
    rows.into_iter().map(Event::try_from).collect()
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    author_id: Uuid,
    event_id: Uuid,
    description: String,
    score: f32,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            author_id: row.author_id,
            event_id: row.event_id,
            description: row.description,
            score: row.score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, nickname, phone, profile_picture_url, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.nickname)
            .bind(&user.phone)
            .bind(&user.profile_picture_url)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "User with this email"))?;

        row.try_into()
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to get user: {e}")))?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to get user: {e}")))?;

        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, id: Uuid, update: &ProfileUpdate) -> Result<User> {
        let sql = format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                nickname = COALESCE($3, nickname), \
                phone = COALESCE($4, phone), \
                profile_picture_url = COALESCE($5, profile_picture_url) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&update.email)
            .bind(&update.nickname)
            .bind(&update.phone)
            .bind(&update.profile_picture_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "User with this email"))?;

        row.ok_or_else(|| EventlyError::NotFound("User".to_string()))?
            .try_into()
    }

    async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<User> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to set role: {e}")))?;

        row.ok_or_else(|| EventlyError::NotFound("User".to_string()))?
            .try_into()
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        // Attendance rows vanish by cascade; keep the counters in step
        sqlx::query(
            "UPDATE events SET participant_count = participant_count - 1 \
             WHERE id IN (SELECT event_id FROM approved_participants WHERE user_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to update counters: {e}")))?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error(e, "User"))?
            .rows_affected();

        if deleted == 0 {
            return Err(EventlyError::NotFound("User".to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to commit: {e}")))
    }
}

#[async_trait]
impl EventRepository for PgStore {
    async fn create_event(&self, event: &NewEvent) -> Result<Event> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO events (
                id, title, description, start_date, end_date,
                creator_id, location, category_id, image_urls, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.creator_id)
        .bind(&event.location)
        .bind(event.category_id)
        .bind(&event.image_urls)
        .bind(EventStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_event_write_error)?;

        self.get_event(id)
            .await?
            .ok_or_else(|| EventlyError::NotFound("Event".to_string()))
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(event_query!("WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to get event: {e}")))?;

        row.map(Event::try_from).transpose()
    }

    async fn event_creator(&self, id: Uuid) -> Result<Option<Uuid>> {
        sqlx::query_scalar("SELECT creator_id FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to get event creator: {e}")))
    }

    async fn list_events(&self, visibility: Visibility, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let all = visibility == Visibility::All;

        let rows: Vec<EventRow> = sqlx::query_as(event_query!(
            "WHERE ($1 OR e.status = 'approved') ORDER BY e.start_date, e.id LIMIT $2 OFFSET $3"
        ))
        .bind(all)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to list events: {e}")))?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events e WHERE ($1 OR e.status = 'approved')")
                .bind(all)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to count events: {e}")))?;

        Ok((into_events(rows)?, total))
    }

    async fn list_events_by_creator(&self, creator_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let rows: Vec<EventRow> = sqlx::query_as(event_query!(
            "WHERE e.creator_id = $1 ORDER BY e.start_date, e.id LIMIT $2 OFFSET $3"
        ))
        .bind(creator_id)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to list events: {e}")))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE creator_id = $1")
            .bind(creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to count events: {e}")))?;

        Ok((into_events(rows)?, total))
    }

    async fn list_attended_events(&self, user_id: Uuid, paging: &Paging) -> Result<(Vec<Event>, i64)> {
        let rows: Vec<EventRow> = sqlx::query_as(event_query!(
            "JOIN approved_participants p ON p.event_id = e.id \
             WHERE p.user_id = $1 ORDER BY e.start_date, e.id LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to list events: {e}")))?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM approved_participants WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to count events: {e}")))?;

        Ok((into_events(rows)?, total))
    }

    async fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<Event> {
        let updated = sqlx::query(
            r#"
            UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                start_date = COALESCE($4, start_date),
                end_date = CASE WHEN $9 THEN $5 ELSE end_date END,
                location = COALESCE($6, location),
                category_id = COALESCE($7, category_id),
                image_urls = COALESCE($8, image_urls)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.start_date)
        .bind(patch.end_date.flatten())
        .bind(&patch.location)
        .bind(patch.category_id)
        .bind(&patch.image_urls)
        .bind(patch.end_date.is_some())
        .execute(&self.pool)
        .await
        .map_err(map_event_write_error)?
        .rows_affected();

        if updated == 0 {
            return Err(EventlyError::NotFound("Event".to_string()));
        }

        self.get_event(id)
            .await?
            .ok_or_else(|| EventlyError::NotFound("Event".to_string()))
    }

    async fn delete_event(&self, id: Uuid) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Event"))?
            .rows_affected();

        if deleted == 0 {
            return Err(EventlyError::NotFound("Event".to_string()));
        }
        Ok(())
    }

    async fn update_event_status(&self, id: Uuid, expected: EventStatus, target: EventStatus) -> Result<bool> {
        let updated = sqlx::query("UPDATE events SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .bind(target.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to update status: {e}")))?
            .rows_affected();

        Ok(updated == 1)
    }

    async fn add_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let inserted = sqlx::query(
            "INSERT INTO approved_participants (event_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "Attendance"))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to rollback: {e}")))?;
            return Ok(false);
        }

        sqlx::query("UPDATE events SET participant_count = participant_count + 1 WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to update counter: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to commit: {e}")))?;
        Ok(true)
    }

    async fn remove_participant(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let deleted =
            sqlx::query("DELETE FROM approved_participants WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to cancel attendance: {e}")))?
                .rows_affected();

        if deleted == 0 {
            tx.rollback()
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to rollback: {e}")))?;
            return Ok(false);
        }

        sqlx::query("UPDATE events SET participant_count = participant_count - 1 WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to update counter: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to commit: {e}")))?;
        Ok(true)
    }

    async fn list_participants(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Participant>, i64)> {
        let rows: Vec<(Uuid, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT u.id, u.nickname, u.profile_picture_url
            FROM approved_participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.event_id = $1
            ORDER BY u.created_at, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to list participants: {e}")))?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM approved_participants WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| EventlyError::DatabaseError(format!("Failed to count participants: {e}")))?;

        let participants = rows
            .into_iter()
            .map(|(id, nickname, profile_picture_url)| Participant {
                id,
                nickname,
                profile_picture_url,
            })
            .collect();

        Ok((participants, total))
    }
}

#[async_trait]
impl CategoryRepository for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to list categories: {e}")))?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to get category: {e}")))?;

        Ok(row.map(Category::from))
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let row: CategoryRow =
            sqlx::query_as("INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING id, name")
                .bind(Uuid::new_v4())
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_db_error(e, "Category"))?;

        Ok(row.into())
    }

    async fn update_category(&self, id: Uuid, name: &str) -> Result<Category> {
        let row: Option<CategoryRow> =
            sqlx::query_as("UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name")
                .bind(id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_db_error(e, "Category"))?;

        row.map(Category::from)
            .ok_or_else(|| EventlyError::NotFound("Category".to_string()))
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "Category"))?
            .rows_affected();

        if deleted == 0 {
            return Err(EventlyError::NotFound("Category".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for PgStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review> {
        let row: ReviewRow = sqlx::query_as(
            r#"
            INSERT INTO reviews (id, author_id, event_id, description, score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, event_id, description, score, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review.author_id)
        .bind(review.event_id)
        .bind(&review.description)
        .bind(review.score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Review"))?;

        Ok(row.into())
    }

    async fn list_reviews(&self, event_id: Uuid, paging: &Paging) -> Result<(Vec<Review>, i64)> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"
            SELECT id, author_id, event_id, description, score, created_at
            FROM reviews
            WHERE event_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(paging.limit())
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EventlyError::DatabaseError(format!("Failed to list reviews: {e}")))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EventlyError::DatabaseError(format!("Failed to count reviews: {e}")))?;

        Ok((rows.into_iter().map(Review::from).collect(), total))
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| EventlyError::DatabaseError(format!("Ping failed: {e}")))
    }
}

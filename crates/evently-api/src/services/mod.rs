//! Business services
//!
//! Each service holds only the repository capabilities it needs and takes
//! the caller's identity as an [`AuthContext`](crate::auth::AuthContext).

pub mod categories;
pub mod events;
pub mod moderation;
pub mod reviews;
pub mod users;

pub use categories::{CategoryRequest, CategoryService};
pub use events::{CreateEventRequest, EventService, UpdateEventRequest};
pub use moderation::{ModerateEventRequest, ModerationService};
pub use reviews::{CreateReviewRequest, ReviewService};
pub use users::{AdminUpdateUserRequest, CreateUserRequest, UpdateProfileRequest, UserService};

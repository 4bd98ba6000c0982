//! API handlers

pub mod auth;
pub mod categories;
pub mod events;
pub mod health;
pub mod moderation;
pub mod reviews;
pub mod users;

//! Event moderation state machine and access policy
//!
//! Events are created `pending`. A moderator moves them to `approved` or
//! `rejected`; both are terminal. Only approved events are public, and only
//! the creator or a moderator may mutate an event.

use crate::{Event, EventlyError, Result, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Moderation status of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }

    /// Validate a moderator decision moving an event from `self` to `target`
    pub fn transition_to(self, target: EventStatus) -> Result<EventStatus> {
        match (self, target) {
            (EventStatus::Pending, EventStatus::Approved | EventStatus::Rejected) => Ok(target),
            (from, to) => Err(EventlyError::InvalidTransition { from, to }),
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = EventlyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            other => Err(EventlyError::ValidationError(format!(
                "unknown event status '{other}'"
            ))),
        }
    }
}

/// Which events a listing may return. Applied inside the store query so
/// that page counts stay correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    ApprovedOnly,
    All,
}

impl Visibility {
    pub fn for_role(role: UserRole) -> Self {
        if role.is_moderator() {
            Visibility::All
        } else {
            Visibility::ApprovedOnly
        }
    }

    pub fn includes(&self, status: EventStatus) -> bool {
        match self {
            Visibility::All => true,
            Visibility::ApprovedOnly => status == EventStatus::Approved,
        }
    }
}

/// Single-event read rule: approved events are public, the creator always
/// sees their own event, moderators see everything.
pub fn can_view_event(event: &Event, actor_id: Uuid, role: UserRole) -> bool {
    event.status == EventStatus::Approved || event.creator_id == actor_id || role.is_moderator()
}

/// Ownership check for event update/delete
pub fn authorize_event_mutation(creator_id: Uuid, actor_id: Uuid, is_moderator: bool) -> Result<()> {
    if is_moderator || creator_id == actor_id {
        return Ok(());
    }
    Err(EventlyError::AccessDenied {
        reason: format!("user {actor_id} is not allowed to modify this event"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use chrono::Utc;
    use proptest::prelude::*;

    fn event_with(status: EventStatus, creator_id: Uuid) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Meetup".to_string(),
            description: String::new(),
            start_date: Utc::now(),
            end_date: None,
            creator_id,
            location: "Room 1".to_string(),
            category: Category {
                id: Uuid::new_v4(),
                name: "Tech".to_string(),
            },
            participant_count: 0,
            image_urls: vec![],
            created_at: Utc::now(),
            status,
        }
    }

    #[test]
    fn test_pending_transitions() {
        assert_eq!(
            EventStatus::Pending.transition_to(EventStatus::Approved).unwrap(),
            EventStatus::Approved
        );
        assert_eq!(
            EventStatus::Pending.transition_to(EventStatus::Rejected).unwrap(),
            EventStatus::Rejected
        );
        assert!(EventStatus::Pending.transition_to(EventStatus::Pending).is_err());
    }

    #[test]
    fn test_terminal_states_reject_every_transition() {
        for from in [EventStatus::Approved, EventStatus::Rejected] {
            assert!(from.is_terminal());
            for to in [EventStatus::Pending, EventStatus::Approved, EventStatus::Rejected] {
                assert!(matches!(
                    from.transition_to(to),
                    Err(EventlyError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("approved".parse::<EventStatus>().unwrap(), EventStatus::Approved);
        assert_eq!("REJECTED".parse::<EventStatus>().unwrap(), EventStatus::Rejected);
        assert!("archived".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_visibility_for_role() {
        assert_eq!(Visibility::for_role(UserRole::User), Visibility::ApprovedOnly);
        assert_eq!(Visibility::for_role(UserRole::Admin), Visibility::All);
        assert!(Visibility::ApprovedOnly.includes(EventStatus::Approved));
        assert!(!Visibility::ApprovedOnly.includes(EventStatus::Pending));
        assert!(!Visibility::ApprovedOnly.includes(EventStatus::Rejected));
        assert!(Visibility::All.includes(EventStatus::Rejected));
    }

    #[test]
    fn test_can_view_event() {
        let creator = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let pending = event_with(EventStatus::Pending, creator);

        assert!(can_view_event(&pending, creator, UserRole::User));
        assert!(!can_view_event(&pending, stranger, UserRole::User));
        assert!(can_view_event(&pending, stranger, UserRole::Admin));

        let approved = event_with(EventStatus::Approved, creator);
        assert!(can_view_event(&approved, stranger, UserRole::User));
    }

    proptest! {
        #[test]
        fn prop_non_owner_is_denied(a in any::<u128>(), b in any::<u128>()) {
            prop_assume!(a != b);
            let (creator, actor) = (Uuid::from_u128(a), Uuid::from_u128(b));
            prop_assert!(authorize_event_mutation(creator, actor, false).is_err());
            prop_assert!(authorize_event_mutation(creator, actor, true).is_ok());
        }

        #[test]
        fn prop_owner_is_allowed(a in any::<u128>(), moderator in any::<bool>()) {
            let id = Uuid::from_u128(a);
            prop_assert!(authorize_event_mutation(id, id, moderator).is_ok());
        }
    }
}

//! Security audit logging
//!
//! Authentication outcomes, role gate denials and moderator actions go to
//! the `audit` target at INFO level so they can be routed apart from the
//! application log. Events raised while serving a request carry the client
//! (IP, user agent) next to the event fields in one JSON record.
//!
//! ```ignore
//! use evently_api::audit::{audit_request, AuditContext, AuditEvent};
//!
//! let client = AuditContext::from_headers(&headers);
//! audit_request(&AuditEvent::LoggedIn { user_id: user.id, email: user.email.clone() }, &client);
//! ```

use axum::http::{header, HeaderMap};
use chrono::Utc;
use evently_core::{EventStatus, UserRole};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Security-relevant happenings
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    Registered {
        user_id: Uuid,
        email: String,
    },
    RegistrationRejected {
        email: String,
        reason: String,
    },
    LoggedIn {
        user_id: Uuid,
        email: String,
    },
    LoginRejected {
        email: String,
        reason: String,
    },
    /// `rotated` is false when the presented refresh token was handed back
    TokensRefreshed {
        user_id: Uuid,
        rotated: bool,
    },
    RefreshRejected {
        reason: String,
    },
    /// Bearer token missing, malformed, expired or of the wrong kind
    TokenRejected {
        reason: String,
    },
    RoleGateDenied {
        user_id: Option<Uuid>,
        role: Option<UserRole>,
        path: String,
        allowed: Vec<UserRole>,
    },
    EventModerated {
        moderator_id: Uuid,
        event_id: Uuid,
        from: EventStatus,
        to: EventStatus,
    },
    /// `actor_id` is absent for changes made from the operator CLI
    RoleChanged {
        actor_id: Option<Uuid>,
        user_id: Uuid,
        role: UserRole,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::Registered { .. } => "Account registered",
            AuditEvent::RegistrationRejected { .. } => "Registration rejected",
            AuditEvent::LoggedIn { .. } => "Login succeeded",
            AuditEvent::LoginRejected { .. } => "Login rejected",
            AuditEvent::TokensRefreshed { .. } => "Tokens refreshed",
            AuditEvent::RefreshRejected { .. } => "Refresh rejected",
            AuditEvent::TokenRejected { .. } => "Bearer token rejected",
            AuditEvent::RoleGateDenied { .. } => "Role gate denied request",
            AuditEvent::EventModerated { .. } => "Event moderated",
            AuditEvent::RoleChanged { .. } => "Role changed",
        }
    }
}

/// Client details taken from request headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: client_ip(headers),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|ua| ua.to_str().ok())
                .map(str::to_owned),
        }
    }
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    #[serde(flatten)]
    event: &'a AuditEvent,
    #[serde(flatten)]
    client: Option<&'a AuditContext>,
}

impl AuditRecord<'_> {
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"error\":\"unserializable audit record: {e}\"}}"))
    }
}

/// Log an event with no request attached
pub fn audit_log(event: &AuditEvent) {
    emit(&AuditRecord { event, client: None });
}

/// Log an event raised while serving a request
pub fn audit_request(event: &AuditEvent, client: &AuditContext) {
    emit(&AuditRecord {
        event,
        client: Some(client),
    });
}

fn emit(record: &AuditRecord<'_>) {
    info!(
        target: "audit",
        timestamp = %Utc::now(),
        ip_address = ?record.client.and_then(|c| c.ip_address.as_deref()),
        record = %record.to_json(),
        "{}",
        record.event.summary()
    );
}

/// First hop of X-Forwarded-For, else X-Real-IP
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record_json(event: &AuditEvent, client: Option<&AuditContext>) -> Value {
        serde_json::from_str(&AuditRecord { event, client }.to_json()).unwrap()
    }

    #[test]
    fn test_record_flattens_client_into_event() {
        let client = AuditContext {
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: None,
        };
        let json = record_json(
            &AuditEvent::LoginRejected {
                email: "someone@example.com".to_string(),
                reason: "Invalid password".to_string(),
            },
            Some(&client),
        );

        assert_eq!(json["event_type"], "login_rejected");
        assert_eq!(json["email"], "someone@example.com");
        assert_eq!(json["ip_address"], "192.168.1.1");
        assert!(json.get("user_agent").is_none());
    }

    #[test]
    fn test_moderation_record_uses_wire_names() {
        let event = AuditEvent::EventModerated {
            moderator_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            from: EventStatus::Pending,
            to: EventStatus::Approved,
        };
        let json = record_json(&event, None);

        assert_eq!(json["event_type"], "event_moderated");
        assert_eq!(json["from"], "pending");
        assert_eq!(json["to"], "approved");
        assert!(json.get("ip_address").is_none());
        audit_log(&event);
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.1, 198.51.100.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " ".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "Mozilla/5.0 (Test)".parse().unwrap());

        let ctx = AuditContext::from_headers(&headers);
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0 (Test)"));
        assert_eq!(ctx.ip_address, None);
        assert_eq!(AuditContext::from_headers(&HeaderMap::new()), AuditContext::default());
    }
}

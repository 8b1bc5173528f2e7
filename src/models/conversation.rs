use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Moderation status of a conversation. Transitions are admin-driven and
/// unconstrained; there is deliberately no state machine here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Pending,
    Resolved,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "resolved" => Self::Resolved,
            "archived" => Self::Archived,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

/// Application-initiated and admin-initiated conversations are distinct
/// contexts: the same user pair may hold one conversation in each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationContext {
    Application,
    Admin,
}

impl ConversationContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::Application,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Talent,
    Company,
    Admin,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Talent => "talent",
            Self::Company => "company",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "company" => Self::Company,
            "admin" => Self::Admin,
            _ => Self::Talent,
        }
    }
}

/// A two-party thread. `participant_id` is the talent/company side,
/// `counterpart_id` the administratively-owning side (an admin, or the other
/// marketplace party for application conversations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub counterpart_id: Uuid,
    pub participant_role: ParticipantRole,
    pub context: ConversationContext,
    pub subject: String,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The other party of the thread, from `user`'s point of view.
    pub fn other_party(&self, user: Uuid) -> Option<Uuid> {
        if user == self.participant_id {
            Some(self.counterpart_id)
        } else if user == self.counterpart_id {
            Some(self.participant_id)
        } else {
            None
        }
    }

    pub fn is_party(&self, user: Uuid) -> bool {
        self.other_party(user).is_some()
    }
}

pub const CONVERSATION_COLUMNS: &str = "id, participant_id, counterpart_id, participant_role, \
     context, subject, status, priority, tags, last_message_preview, last_message_at, \
     created_at, updated_at";

impl<'r> FromRow<'r, PgRow> for Conversation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let priority: String = row.try_get("priority")?;
        let context: String = row.try_get("context")?;
        let role: String = row.try_get("participant_role")?;
        Ok(Conversation {
            id: row.try_get("id")?,
            participant_id: row.try_get("participant_id")?,
            counterpart_id: row.try_get("counterpart_id")?,
            participant_role: ParticipantRole::from_str(&role),
            context: ConversationContext::from_str(&context),
            subject: row.try_get("subject")?,
            status: ConversationStatus::from_str(&status),
            priority: Priority::from_str(&priority),
            tags: row.try_get("tags")?,
            last_message_preview: row.try_get("last_message_preview")?,
            last_message_at: row.try_get("last_message_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips() {
        for s in ["active", "pending", "resolved", "archived"] {
            assert_eq!(ConversationStatus::from_str(s).as_str(), s);
        }
        for p in ["low", "medium", "high"] {
            assert_eq!(Priority::from_str(p).as_str(), p);
        }
        assert_eq!(ConversationContext::from_str("admin").as_str(), "admin");
        assert_eq!(
            ConversationContext::from_str("application").as_str(),
            "application"
        );
    }

    #[test]
    fn unknown_status_falls_back_to_active() {
        assert_eq!(
            ConversationStatus::from_str("bogus"),
            ConversationStatus::Active
        );
    }

    #[test]
    fn other_party_requires_membership() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = Conversation {
            id: Uuid::new_v4(),
            participant_id: a,
            counterpart_id: b,
            participant_role: ParticipantRole::Talent,
            context: ConversationContext::Application,
            subject: String::new(),
            status: ConversationStatus::Active,
            priority: Priority::Medium,
            tags: vec![],
            last_message_preview: None,
            last_message_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.other_party(a), Some(b));
        assert_eq!(conv.other_party(b), Some(a));
        assert_eq!(conv.other_party(Uuid::new_v4()), None);
    }
}

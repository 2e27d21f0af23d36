//! Value records mirrored from REST responses.
//!
//! Field names follow the backend's camelCase JSON. Unknown backend fields on
//! companies are preserved in `extra` so callers can still reach them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    AutoAccepted,
    Canceled,
    Declined,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InvitationStatus {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted | Self::AutoAccepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    #[serde(default)]
    pub status: InvitationStatus,
    /// Backend invitation kind, e.g. `visibility` or `registration`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviting_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviting_user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notification_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_to_join_meeting: Option<bool>,
}

impl Invitation {
    pub fn is_registration(&self) -> bool {
        self.kind.as_deref() == Some("registration")
    }

    pub fn is_meeting_invite(&self) -> bool {
        self.invite_to_join_meeting.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Presence level as seen by application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceLevel {
    #[default]
    Online,
    Away,
    Dnd,
    Invisible,
    Offline,
}

impl PresenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }

    /// The `<show/>` and `<status/>` values announced for this level.
    /// `None` means the element is omitted.
    pub fn to_show_status(self) -> (Option<&'static str>, &'static str) {
        match self {
            Self::Online => (None, "mode=auto"),
            Self::Away => (Some("xa"), "away"),
            Self::Dnd => (Some("dnd"), ""),
            Self::Invisible => (Some("xa"), ""),
            Self::Offline => (None, ""),
        }
    }

    /// Interpret a received presence. `available` is false for
    /// `type="unavailable"`.
    pub fn from_show_status(show: Option<&str>, status: &str, available: bool) -> Self {
        if !available {
            return Self::Offline;
        }
        match show {
            None | Some("") | Some("chat") => Self::Online,
            Some("dnd") => Self::Dnd,
            Some("away") => Self::Away,
            Some("xa") if status == "away" => Self::Away,
            Some("xa") => Self::Invisible,
            Some(_) => Self::Online,
        }
    }
}

impl std::fmt::Display for PresenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PresenceLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "dnd" => Ok(Self::Dnd),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown presence level: {other}")),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user embedded in skill/message/exchange/review responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub profile_image: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

/// Self-service profile edit; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_offering: bool,
    pub time_availability: Option<String>,
    pub media: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSkill {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_offering: bool,
    pub time_availability: Option<String>,
    pub media: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SkillPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_offering: Option<bool>,
    pub time_availability: Option<Option<String>>,
    pub media: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Rejected,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Accepted => "accepted",
            ExchangeStatus::InProgress => "in_progress",
            ExchangeStatus::Completed => "completed",
            ExchangeStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExchangeStatus::Pending),
            "accepted" => Ok(ExchangeStatus::Accepted),
            "in_progress" => Ok(ExchangeStatus::InProgress),
            "completed" => Ok(ExchangeStatus::Completed),
            "rejected" => Ok(ExchangeStatus::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: i64,
    pub requester_id: i64,
    pub provider_id: i64,
    pub requester_skill_id: Option<i64>,
    pub provider_skill_id: Option<i64>,
    pub status: ExchangeStatus,
    pub next_session: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.requester_id == user_id || self.provider_id == user_id
    }

    /// The participant on the other side of the exchange, if `user_id` is one.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        if user_id == self.requester_id {
            Some(self.provider_id)
        } else if user_id == self.provider_id {
            Some(self.requester_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewExchange {
    pub requester_id: i64,
    pub provider_id: i64,
    pub requester_skill_id: Option<i64>,
    pub provider_skill_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub exchange_id: i64,
    pub reviewer_id: i64,
    pub receiver_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub exchange_id: i64,
    pub reviewer_id: i64,
    pub receiver_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

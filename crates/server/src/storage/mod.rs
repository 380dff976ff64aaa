pub mod database;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    Exchange, ExchangeStatus, Message, NewExchange, NewMessage, NewReview, NewSkill, NewUser,
    Review, Skill, SkillPatch, User, UserPatch,
};
use crate::error::Result;

/// Uniform persistence contract. Absence of an entity is an `Ok(None)` or
/// `Ok(false)`, never an error; `Err` is reserved for infrastructure failures.
#[async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn delete_user(&self, id: i64) -> Result<bool>;

    // Skills
    async fn get_skill(&self, id: i64) -> Result<Option<Skill>>;
    async fn get_skills_by_user(&self, user_id: i64) -> Result<Vec<Skill>>;
    async fn get_skills_by_category(&self, category: &str) -> Result<Vec<Skill>>;
    async fn get_skills_by_tags(&self, tags: &[String]) -> Result<Vec<Skill>>;
    async fn get_recent_skills(&self, limit: usize) -> Result<Vec<Skill>>;
    async fn get_offering_skills(&self) -> Result<Vec<Skill>>;
    async fn get_requesting_skills(&self) -> Result<Vec<Skill>>;
    async fn create_skill(&self, skill: NewSkill) -> Result<Skill>;
    async fn update_skill(&self, id: i64, patch: SkillPatch) -> Result<Option<Skill>>;
    async fn delete_skill(&self, id: i64) -> Result<bool>;
    async fn list_skills(&self) -> Result<Vec<Skill>>;

    // Messages
    async fn get_message(&self, id: i64) -> Result<Option<Message>>;
    async fn get_messages_by_user(&self, user_id: i64) -> Result<Vec<Message>>;
    async fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>>;
    async fn get_unread_messages_count(&self, user_id: i64) -> Result<i64>;
    async fn create_message(&self, message: NewMessage) -> Result<Message>;
    async fn mark_message_as_read(&self, id: i64) -> Result<bool>;

    // Exchanges
    async fn get_exchange(&self, id: i64) -> Result<Option<Exchange>>;
    async fn get_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>>;
    async fn get_active_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>>;
    async fn create_exchange(&self, exchange: NewExchange) -> Result<Exchange>;
    async fn update_exchange_status(
        &self,
        id: i64,
        status: ExchangeStatus,
    ) -> Result<Option<Exchange>>;
    async fn update_exchange_next_session(
        &self,
        id: i64,
        next_session: DateTime<Utc>,
    ) -> Result<Option<Exchange>>;

    // Reviews
    async fn get_review(&self, id: i64) -> Result<Option<Review>>;
    async fn get_reviews_by_user(&self, user_id: i64) -> Result<Vec<Review>>;
    async fn create_review(&self, review: NewReview) -> Result<Review>;
    async fn get_average_rating_for_user(&self, user_id: i64) -> Result<f64>;
}

pub type DynStorage = Arc<dyn Storage>;

/// Exchanges a user is actively working: accepted or underway. Pending
/// requests and terminal exchanges are excluded.
pub fn is_active_status(status: ExchangeStatus) -> bool {
    matches!(
        status,
        ExchangeStatus::Accepted | ExchangeStatus::InProgress
    )
}

/// Mean of all ratings received, rounded to one decimal; 0.0 without reviews.
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let total: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    let mean = total as f64 / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

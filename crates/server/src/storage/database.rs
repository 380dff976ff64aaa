use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::models::{
    Exchange, ExchangeStatus, Message, NewExchange, NewMessage, NewReview, NewSkill, NewUser,
    Review, Skill, SkillPatch, User, UserPatch,
};
use crate::error::{AppError, Result};

use super::{average_rating, Storage};

/// Relational storage backed by the sqlite pool. Timestamps are stored as
/// RFC 3339 text, tags as a JSON-encoded array.
#[derive(Clone)]
pub struct DatabaseStorage {
    pool: SqlitePool,
}

impl DatabaseStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid timestamp in database: {e}")))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        email: row.get("email"),
        name: row.get("name"),
        bio: row.get("bio"),
        profile_image: row.get("profile_image"),
        is_admin: row.get("is_admin"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn skill_from_row(row: &SqliteRow) -> Result<Skill> {
    let tags: String = row.get("tags");
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| AppError::Internal(format!("Invalid tags in database: {e}")))?;
    Ok(Skill {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        tags,
        is_offering: row.get("is_offering"),
        time_availability: row.get("time_availability"),
        media: row.get("media"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    Ok(Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        read: row.get("read"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn exchange_from_row(row: &SqliteRow) -> Result<Exchange> {
    let status: String = row.get("status");
    let status = status
        .parse::<ExchangeStatus>()
        .map_err(|_| AppError::Internal(format!("Invalid exchange status in database: {status}")))?;
    let next_session: Option<String> = row.get("next_session");
    let next_session = next_session.as_deref().map(parse_timestamp).transpose()?;
    Ok(Exchange {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        provider_id: row.get("provider_id"),
        requester_skill_id: row.get("requester_skill_id"),
        provider_skill_id: row.get("provider_skill_id"),
        status,
        next_session,
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn review_from_row(row: &SqliteRow) -> Result<Review> {
    Ok(Review {
        id: row.get("id"),
        exchange_id: row.get("exchange_id"),
        reviewer_id: row.get("reviewer_id"),
        receiver_id: row.get("receiver_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE LOWER(username) = LOWER(?)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE LOWER(email) = LOWER(?)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, email, name, bio, profile_image, is_admin, created_at)
            VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.bio)
        .bind(&user.profile_image)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            name: user.name,
            bio: user.bio,
            profile_image: user.profile_image,
            is_admin: false,
            created_at: now,
        })
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>> {
        let Some(mut user) = self.get_user(id).await? else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(bio) = patch.bio {
            user.bio = Some(bio);
        }
        if let Some(profile_image) = patch.profile_image {
            user.profile_image = Some(profile_image);
        }

        sqlx::query("UPDATE users SET name = ?, bio = ?, profile_image = ? WHERE id = ?")
            .bind(&user.name)
            .bind(&user.bio)
            .bind(&user.profile_image)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Some(user))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        // Skills, messages, exchanges, and reviews cascade via the foreign keys
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_skill(&self, id: i64) -> Result<Option<Skill>> {
        let row = sqlx::query("SELECT * FROM skills WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(skill_from_row).transpose()
    }

    async fn get_skills_by_user(&self, user_id: i64) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn get_skills_by_category(&self, category: &str) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills WHERE LOWER(category) = LOWER(?)")
            .bind(category)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn get_skills_by_tags(&self, tags: &[String]) -> Result<Vec<Skill>> {
        // Tags live in a JSON column, so the overlap test runs in memory
        let skills = self.list_skills().await?;
        Ok(skills
            .into_iter()
            .filter(|s| tags.iter().any(|t| s.tags.contains(t)))
            .collect())
    }

    async fn get_recent_skills(&self, limit: usize) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn get_offering_skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills WHERE is_offering = TRUE")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn get_requesting_skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills WHERE is_offering = FALSE")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn create_skill(&self, skill: NewSkill) -> Result<Skill> {
        let now = Utc::now();
        let tags_json = serde_json::to_string(&skill.tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {e}")))?;
        let result = sqlx::query(
            r#"
            INSERT INTO skills (user_id, title, description, category, tags, is_offering, time_availability, media, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(skill.user_id)
        .bind(&skill.title)
        .bind(&skill.description)
        .bind(&skill.category)
        .bind(&tags_json)
        .bind(skill.is_offering)
        .bind(&skill.time_availability)
        .bind(&skill.media)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Skill {
            id: result.last_insert_rowid(),
            user_id: skill.user_id,
            title: skill.title,
            description: skill.description,
            category: skill.category,
            tags: skill.tags,
            is_offering: skill.is_offering,
            time_availability: skill.time_availability,
            media: skill.media,
            created_at: now,
        })
    }

    async fn update_skill(&self, id: i64, patch: SkillPatch) -> Result<Option<Skill>> {
        let Some(mut skill) = self.get_skill(id).await? else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            skill.title = title;
        }
        if let Some(description) = patch.description {
            skill.description = description;
        }
        if let Some(category) = patch.category {
            skill.category = category;
        }
        if let Some(tags) = patch.tags {
            skill.tags = tags;
        }
        if let Some(is_offering) = patch.is_offering {
            skill.is_offering = is_offering;
        }
        if let Some(time_availability) = patch.time_availability {
            skill.time_availability = time_availability;
        }
        if let Some(media) = patch.media {
            skill.media = media;
        }

        let tags_json = serde_json::to_string(&skill.tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {e}")))?;
        sqlx::query(
            r#"
            UPDATE skills
            SET title = ?, description = ?, category = ?, tags = ?, is_offering = ?,
                time_availability = ?, media = ?
            WHERE id = ?
            "#,
        )
        .bind(&skill.title)
        .bind(&skill.description)
        .bind(&skill.category)
        .bind(&tags_json)
        .bind(skill.is_offering)
        .bind(&skill.time_availability)
        .bind(&skill.media)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(skill))
    }

    async fn delete_skill(&self, id: i64) -> Result<bool> {
        // Exchange references are nulled by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM skills WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        let rows = sqlx::query("SELECT * FROM skills ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(skill_from_row).collect()
    }

    async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn get_messages_by_user(&self, user_id: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query("SELECT * FROM messages WHERE sender_id = ? OR receiver_id = ?")
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn get_unread_messages_count(&self, user_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content, read, created_at)
            VALUES (?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            read: false,
            created_at: now,
        })
    }

    async fn mark_message_as_read(&self, id: i64) -> Result<bool> {
        // Updates an already-read message too, so the call stays idempotent
        let result = sqlx::query("UPDATE messages SET read = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_exchange(&self, id: i64) -> Result<Option<Exchange>> {
        let row = sqlx::query("SELECT * FROM exchanges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(exchange_from_row).transpose()
    }

    async fn get_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM exchanges
            WHERE requester_id = ? OR provider_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(exchange_from_row).collect()
    }

    async fn get_active_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM exchanges
            WHERE (requester_id = ? OR provider_id = ?)
              AND status IN ('accepted', 'in_progress')
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(exchange_from_row).collect()
    }

    async fn create_exchange(&self, exchange: NewExchange) -> Result<Exchange> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO exchanges (requester_id, provider_id, requester_skill_id, provider_skill_id, status, next_session, created_at)
            VALUES (?, ?, ?, ?, 'pending', NULL, ?)
            "#,
        )
        .bind(exchange.requester_id)
        .bind(exchange.provider_id)
        .bind(exchange.requester_skill_id)
        .bind(exchange.provider_skill_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Exchange {
            id: result.last_insert_rowid(),
            requester_id: exchange.requester_id,
            provider_id: exchange.provider_id,
            requester_skill_id: exchange.requester_skill_id,
            provider_skill_id: exchange.provider_skill_id,
            status: ExchangeStatus::Pending,
            next_session: None,
            created_at: now,
        })
    }

    async fn update_exchange_status(
        &self,
        id: i64,
        status: ExchangeStatus,
    ) -> Result<Option<Exchange>> {
        let result = sqlx::query("UPDATE exchanges SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_exchange(id).await
    }

    async fn update_exchange_next_session(
        &self,
        id: i64,
        next_session: DateTime<Utc>,
    ) -> Result<Option<Exchange>> {
        let result = sqlx::query("UPDATE exchanges SET next_session = ? WHERE id = ?")
            .bind(next_session.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_exchange(id).await
    }

    async fn get_review(&self, id: i64) -> Result<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(review_from_row).transpose()
    }

    async fn get_reviews_by_user(&self, user_id: i64) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            "SELECT * FROM reviews WHERE receiver_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn create_review(&self, review: NewReview) -> Result<Review> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (exchange_id, reviewer_id, receiver_id, rating, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(review.exchange_id)
        .bind(review.reviewer_id)
        .bind(review.receiver_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Review {
            id: result.last_insert_rowid(),
            exchange_id: review.exchange_id,
            reviewer_id: review.reviewer_id,
            receiver_id: review.receiver_id,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
        })
    }

    async fn get_average_rating_for_user(&self, user_id: i64) -> Result<f64> {
        let reviews = self.get_reviews_by_user(user_id).await?;
        Ok(average_rating(&reviews))
    }
}

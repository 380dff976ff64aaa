use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::models::{
    Exchange, ExchangeStatus, Message, NewExchange, NewMessage, NewReview, NewSkill, NewUser,
    Review, Skill, SkillPatch, User, UserPatch,
};
use crate::error::Result;

use super::{average_rating, is_active_status, Storage};

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    skills: HashMap<i64, Skill>,
    messages: HashMap<i64, Message>,
    exchanges: HashMap<i64, Exchange>,
    reviews: HashMap<i64, Review>,
    next_user_id: i64,
    next_skill_id: i64,
    next_message_id: i64,
    next_exchange_id: i64,
    next_review_id: i64,
}

/// Map-backed storage for tests and local development. Satisfies the same
/// contract as [`super::database::DatabaseStorage`].
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        tables.next_user_id += 1;
        let id = tables.next_user_id;
        let new_user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            name: user.name,
            bio: user.bio,
            profile_image: user.profile_image,
            is_admin: false,
            created_at: Utc::now(),
        };
        tables.users.insert(id, new_user.clone());
        Ok(new_user)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
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
        Ok(Some(user.clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        // Skills, messages, exchanges, and reviews involving the user go
        // with it, same as the ON DELETE CASCADE foreign keys
        let removed_skills: Vec<i64> = tables
            .skills
            .values()
            .filter(|s| s.user_id == id)
            .map(|s| s.id)
            .collect();
        tables.skills.retain(|_, s| s.user_id != id);
        tables
            .messages
            .retain(|_, m| m.sender_id != id && m.receiver_id != id);
        let removed_exchanges: Vec<i64> = tables
            .exchanges
            .values()
            .filter(|e| e.is_participant(id))
            .map(|e| e.id)
            .collect();
        tables.exchanges.retain(|_, e| !e.is_participant(id));
        for exchange in tables.exchanges.values_mut() {
            if exchange
                .requester_skill_id
                .is_some_and(|s| removed_skills.contains(&s))
            {
                exchange.requester_skill_id = None;
            }
            if exchange
                .provider_skill_id
                .is_some_and(|s| removed_skills.contains(&s))
            {
                exchange.provider_skill_id = None;
            }
        }
        tables.reviews.retain(|_, r| {
            r.reviewer_id != id
                && r.receiver_id != id
                && !removed_exchanges.contains(&r.exchange_id)
        });
        Ok(true)
    }

    async fn get_skill(&self, id: i64) -> Result<Option<Skill>> {
        Ok(self.tables.read().await.skills.get(&id).cloned())
    }

    async fn get_skills_by_user(&self, user_id: i64) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_skills_by_category(&self, category: &str) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .filter(|s| s.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect())
    }

    async fn get_skills_by_tags(&self, tags: &[String]) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .filter(|s| tags.iter().any(|t| s.tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn get_recent_skills(&self, limit: usize) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        let mut skills: Vec<Skill> = tables.skills.values().cloned().collect();
        skills.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        skills.truncate(limit);
        Ok(skills)
    }

    async fn get_offering_skills(&self) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .filter(|s| s.is_offering)
            .cloned()
            .collect())
    }

    async fn get_requesting_skills(&self) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .filter(|s| !s.is_offering)
            .cloned()
            .collect())
    }

    async fn create_skill(&self, skill: NewSkill) -> Result<Skill> {
        let mut tables = self.tables.write().await;
        tables.next_skill_id += 1;
        let id = tables.next_skill_id;
        let new_skill = Skill {
            id,
            user_id: skill.user_id,
            title: skill.title,
            description: skill.description,
            category: skill.category,
            tags: skill.tags,
            is_offering: skill.is_offering,
            time_availability: skill.time_availability,
            media: skill.media,
            created_at: Utc::now(),
        };
        tables.skills.insert(id, new_skill.clone());
        Ok(new_skill)
    }

    async fn update_skill(&self, id: i64, patch: SkillPatch) -> Result<Option<Skill>> {
        let mut tables = self.tables.write().await;
        let Some(skill) = tables.skills.get_mut(&id) else {
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
        Ok(Some(skill.clone()))
    }

    async fn delete_skill(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.skills.remove(&id).is_none() {
            return Ok(false);
        }
        // Exchanges keep running with the skill reference nulled out
        for exchange in tables.exchanges.values_mut() {
            if exchange.requester_skill_id == Some(id) {
                exchange.requester_skill_id = None;
            }
            if exchange.provider_skill_id == Some(id) {
                exchange.provider_skill_id = None;
            }
        }
        Ok(true)
    }

    async fn list_skills(&self) -> Result<Vec<Skill>> {
        let tables = self.tables.read().await;
        let mut skills: Vec<Skill> = tables.skills.values().cloned().collect();
        skills.sort_by_key(|s| s.id);
        Ok(skills)
    }

    async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        Ok(self.tables.read().await.messages.get(&id).cloned())
    }

    async fn get_messages_by_user(&self, user_id: i64) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .values()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .values()
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn get_unread_messages_count(&self, user_id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .values()
            .filter(|m| m.receiver_id == user_id && !m.read)
            .count() as i64)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let mut tables = self.tables.write().await;
        tables.next_message_id += 1;
        let id = tables.next_message_id;
        let new_message = Message {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            read: false,
            created_at: Utc::now(),
        };
        tables.messages.insert(id, new_message.clone());
        Ok(new_message)
    }

    async fn mark_message_as_read(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(message) = tables.messages.get_mut(&id) else {
            return Ok(false);
        };
        message.read = true;
        Ok(true)
    }

    async fn get_exchange(&self, id: i64) -> Result<Option<Exchange>> {
        Ok(self.tables.read().await.exchanges.get(&id).cloned())
    }

    async fn get_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>> {
        let tables = self.tables.read().await;
        let mut exchanges: Vec<Exchange> = tables
            .exchanges
            .values()
            .filter(|e| e.is_participant(user_id))
            .cloned()
            .collect();
        exchanges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(exchanges)
    }

    async fn get_active_exchanges_by_user(&self, user_id: i64) -> Result<Vec<Exchange>> {
        let tables = self.tables.read().await;
        let mut exchanges: Vec<Exchange> = tables
            .exchanges
            .values()
            .filter(|e| e.is_participant(user_id) && is_active_status(e.status))
            .cloned()
            .collect();
        exchanges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(exchanges)
    }

    async fn create_exchange(&self, exchange: NewExchange) -> Result<Exchange> {
        let mut tables = self.tables.write().await;
        tables.next_exchange_id += 1;
        let id = tables.next_exchange_id;
        let new_exchange = Exchange {
            id,
            requester_id: exchange.requester_id,
            provider_id: exchange.provider_id,
            requester_skill_id: exchange.requester_skill_id,
            provider_skill_id: exchange.provider_skill_id,
            status: ExchangeStatus::Pending,
            next_session: None,
            created_at: Utc::now(),
        };
        tables.exchanges.insert(id, new_exchange.clone());
        Ok(new_exchange)
    }

    async fn update_exchange_status(
        &self,
        id: i64,
        status: ExchangeStatus,
    ) -> Result<Option<Exchange>> {
        let mut tables = self.tables.write().await;
        let Some(exchange) = tables.exchanges.get_mut(&id) else {
            return Ok(None);
        };
        exchange.status = status;
        Ok(Some(exchange.clone()))
    }

    async fn update_exchange_next_session(
        &self,
        id: i64,
        next_session: DateTime<Utc>,
    ) -> Result<Option<Exchange>> {
        let mut tables = self.tables.write().await;
        let Some(exchange) = tables.exchanges.get_mut(&id) else {
            return Ok(None);
        };
        exchange.next_session = Some(next_session);
        Ok(Some(exchange.clone()))
    }

    async fn get_review(&self, id: i64) -> Result<Option<Review>> {
        Ok(self.tables.read().await.reviews.get(&id).cloned())
    }

    async fn get_reviews_by_user(&self, user_id: i64) -> Result<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.receiver_id == user_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review> {
        let mut tables = self.tables.write().await;
        tables.next_review_id += 1;
        let id = tables.next_review_id;
        let new_review = Review {
            id,
            exchange_id: review.exchange_id,
            reviewer_id: review.reviewer_id,
            receiver_id: review.receiver_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        tables.reviews.insert(id, new_review.clone());
        Ok(new_review)
    }

    async fn get_average_rating_for_user(&self, user_id: i64) -> Result<f64> {
        let reviews = self.get_reviews_by_user(user_id).await?;
        Ok(average_rating(&reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            email: format!("{username}@example.com"),
            name: username.to_string(),
            bio: None,
            profile_image: None,
        }
    }

    fn new_skill(user_id: i64, title: &str, tags: &[&str], is_offering: bool) -> NewSkill {
        NewSkill {
            user_id,
            title: title.to_string(),
            description: "desc".to_string(),
            category: "Programming".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_offering,
            time_availability: None,
            media: None,
        }
    }

    #[tokio::test]
    async fn username_lookup_is_case_insensitive() {
        let storage = MemStorage::new();
        let created = storage.create_user(new_user("Alice")).await.unwrap();

        let found = storage.get_user_by_username("alice").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));

        let found = storage.get_user_by_username("ALICE").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("Alice".to_string()));

        assert!(storage.get_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_user_has_defaults() {
        let storage = MemStorage::new();
        let user = storage.create_user(new_user("alice")).await.unwrap();
        assert!(!user.is_admin);
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn skills_by_tags_matches_any_shared_tag() {
        let storage = MemStorage::new();
        let user = storage.create_user(new_user("alice")).await.unwrap();
        storage
            .create_skill(new_skill(user.id, "Python tutoring", &["python", "tutoring"], true))
            .await
            .unwrap();
        storage
            .create_skill(new_skill(user.id, "Guitar", &["music", "guitar"], true))
            .await
            .unwrap();
        storage
            .create_skill(new_skill(user.id, "Data science", &["python", "stats"], false))
            .await
            .unwrap();

        let matched = storage
            .get_skills_by_tags(&["python".to_string()])
            .await
            .unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|s| s.tags.contains(&"python".to_string())));
    }

    #[tokio::test]
    async fn recent_skills_are_newest_first_and_truncated() {
        let storage = MemStorage::new();
        let user = storage.create_user(new_user("alice")).await.unwrap();
        for i in 0..5 {
            storage
                .create_skill(new_skill(user.id, &format!("skill-{i}"), &[], true))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let recent = storage.get_recent_skills(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].created_at >= recent[1].created_at);
        assert!(recent[1].created_at >= recent[2].created_at);
        assert_eq!(recent[0].title, "skill-4");
    }

    #[tokio::test]
    async fn delete_skill_nulls_exchange_references() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        let skill = storage
            .create_skill(new_skill(alice.id, "Piano", &[], true))
            .await
            .unwrap();
        let exchange = storage
            .create_exchange(NewExchange {
                requester_id: bob.id,
                provider_id: alice.id,
                requester_skill_id: None,
                provider_skill_id: Some(skill.id),
            })
            .await
            .unwrap();

        assert!(storage.delete_skill(skill.id).await.unwrap());
        assert!(!storage.delete_skill(skill.id).await.unwrap());

        let exchange = storage.get_exchange(exchange.id).await.unwrap().unwrap();
        assert_eq!(exchange.provider_skill_id, None);
    }

    #[tokio::test]
    async fn mark_message_as_read_is_idempotent() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        let message = storage
            .create_message(NewMessage {
                sender_id: alice.id,
                receiver_id: bob.id,
                content: "Hi".to_string(),
            })
            .await
            .unwrap();
        assert!(!message.read);
        assert_eq!(storage.get_unread_messages_count(bob.id).await.unwrap(), 1);

        assert!(storage.mark_message_as_read(message.id).await.unwrap());
        assert!(storage.mark_message_as_read(message.id).await.unwrap());

        let message = storage.get_message(message.id).await.unwrap().unwrap();
        assert!(message.read);
        assert_eq!(storage.get_unread_messages_count(bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn conversation_is_bidirectional_and_ascending() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        let carol = storage.create_user(new_user("carol")).await.unwrap();

        for (from, to, text) in [
            (alice.id, bob.id, "hi bob"),
            (bob.id, alice.id, "hi alice"),
            (alice.id, carol.id, "hi carol"),
        ] {
            storage
                .create_message(NewMessage {
                    sender_id: from,
                    receiver_id: to,
                    content: text.to_string(),
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let conversation = storage.get_conversation(alice.id, bob.id).await.unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, "hi bob");
        assert_eq!(conversation[1].content, "hi alice");
    }

    #[tokio::test]
    async fn active_exchanges_exclude_pending_and_terminal() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..4 {
            let e = storage
                .create_exchange(NewExchange {
                    requester_id: bob.id,
                    provider_id: alice.id,
                    requester_skill_id: None,
                    provider_skill_id: None,
                })
                .await
                .unwrap();
            ids.push(e.id);
        }
        storage
            .update_exchange_status(ids[1], ExchangeStatus::Accepted)
            .await
            .unwrap();
        storage
            .update_exchange_status(ids[2], ExchangeStatus::InProgress)
            .await
            .unwrap();
        storage
            .update_exchange_status(ids[3], ExchangeStatus::Completed)
            .await
            .unwrap();

        let active = storage.get_active_exchanges_by_user(alice.id).await.unwrap();
        let active_ids: Vec<i64> = active.iter().map(|e| e.id).collect();
        assert_eq!(active.len(), 2);
        assert!(active_ids.contains(&ids[1]));
        assert!(active_ids.contains(&ids[2]));
    }

    #[tokio::test]
    async fn average_rating_is_zero_without_reviews_and_rounded() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();

        assert_eq!(
            storage.get_average_rating_for_user(alice.id).await.unwrap(),
            0.0
        );

        let exchange = storage
            .create_exchange(NewExchange {
                requester_id: bob.id,
                provider_id: alice.id,
                requester_skill_id: None,
                provider_skill_id: None,
            })
            .await
            .unwrap();
        for rating in [3, 5] {
            storage
                .create_review(NewReview {
                    exchange_id: exchange.id,
                    reviewer_id: bob.id,
                    receiver_id: alice.id,
                    rating,
                    comment: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(
            storage.get_average_rating_for_user(alice.id).await.unwrap(),
            4.0
        );
    }

    #[tokio::test]
    async fn delete_user_cascades_to_dependents() {
        let storage = MemStorage::new();
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        storage
            .create_skill(new_skill(alice.id, "Piano", &[], true))
            .await
            .unwrap();
        storage
            .create_message(NewMessage {
                sender_id: alice.id,
                receiver_id: bob.id,
                content: "Hi".to_string(),
            })
            .await
            .unwrap();
        let exchange = storage
            .create_exchange(NewExchange {
                requester_id: bob.id,
                provider_id: alice.id,
                requester_skill_id: None,
                provider_skill_id: None,
            })
            .await
            .unwrap();
        storage
            .create_review(NewReview {
                exchange_id: exchange.id,
                reviewer_id: bob.id,
                receiver_id: alice.id,
                rating: 5,
                comment: None,
            })
            .await
            .unwrap();

        assert!(storage.delete_user(alice.id).await.unwrap());
        assert!(!storage.delete_user(alice.id).await.unwrap());

        assert!(storage.get_skills_by_user(alice.id).await.unwrap().is_empty());
        assert!(storage.get_messages_by_user(bob.id).await.unwrap().is_empty());
        assert!(storage.get_exchanges_by_user(bob.id).await.unwrap().is_empty());
        assert!(storage.get_reviews_by_user(alice.id).await.unwrap().is_empty());
        assert_eq!(
            storage.get_average_rating_for_user(alice.id).await.unwrap(),
            0.0
        );
    }
}

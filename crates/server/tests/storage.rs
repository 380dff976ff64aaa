//! Contract tests run against both storage backends, so the map-backed and
//! sqlite-backed implementations cannot drift apart.

use std::sync::Arc;

use skillswap_server::db::models::{
    ExchangeStatus, NewExchange, NewMessage, NewReview, NewSkill, NewUser, SkillPatch,
};
use skillswap_server::db::Database;
use skillswap_server::storage::{database::DatabaseStorage, memory::MemStorage, Storage};

async fn backends() -> Vec<(&'static str, Arc<dyn Storage>)> {
    let db = Database::connect_with("sqlite::memory:", 1).await.unwrap();
    db.run_migrations().await.unwrap();
    vec![
        ("memory", Arc::new(MemStorage::new())),
        ("database", Arc::new(DatabaseStorage::new(db.pool))),
    ]
}

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

fn new_skill(user_id: i64, title: &str) -> NewSkill {
    NewSkill {
        user_id,
        title: title.to_string(),
        description: "desc".to_string(),
        category: "Programming".to_string(),
        tags: vec!["python".to_string()],
        is_offering: true,
        time_availability: Some("Weekends".to_string()),
        media: None,
    }
}

#[tokio::test]
async fn user_lookups_are_case_insensitive() {
    for (label, storage) in backends().await {
        let created = storage.create_user(new_user("Alice")).await.unwrap();

        let by_name = storage.get_user_by_username("ALICE").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(created.id), "{label}");

        let by_email = storage.get_user_by_email("Alice@Example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id), "{label}");
    }
}

#[tokio::test]
async fn delete_user_cascades_to_dependents() {
    for (label, storage) in backends().await {
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        storage
            .create_skill(new_skill(alice.id, "Piano"))
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

        assert!(storage.delete_user(alice.id).await.unwrap(), "{label}");
        assert!(!storage.delete_user(alice.id).await.unwrap(), "{label}");

        assert!(storage.get_user(alice.id).await.unwrap().is_none(), "{label}");
        assert!(
            storage.get_skills_by_user(alice.id).await.unwrap().is_empty(),
            "{label}"
        );
        assert!(
            storage.get_messages_by_user(bob.id).await.unwrap().is_empty(),
            "{label}"
        );
        assert!(
            storage.get_exchanges_by_user(bob.id).await.unwrap().is_empty(),
            "{label}"
        );
        assert!(
            storage.get_reviews_by_user(alice.id).await.unwrap().is_empty(),
            "{label}"
        );
        // Bob survives untouched
        assert!(storage.get_user(bob.id).await.unwrap().is_some(), "{label}");
    }
}

#[tokio::test]
async fn delete_skill_nulls_exchange_references() {
    for (label, storage) in backends().await {
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        let skill = storage
            .create_skill(new_skill(alice.id, "Piano"))
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

        assert!(storage.delete_skill(skill.id).await.unwrap(), "{label}");

        let exchange = storage.get_exchange(exchange.id).await.unwrap().unwrap();
        assert_eq!(exchange.provider_skill_id, None, "{label}");
    }
}

#[tokio::test]
async fn skill_patch_clears_optional_fields() {
    for (label, storage) in backends().await {
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let skill = storage
            .create_skill(new_skill(alice.id, "Piano"))
            .await
            .unwrap();
        assert!(skill.time_availability.is_some());

        let updated = storage
            .update_skill(
                skill.id,
                SkillPatch {
                    title: None,
                    description: None,
                    category: None,
                    tags: None,
                    is_offering: None,
                    time_availability: Some(None),
                    media: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.time_availability, None, "{label}");
        assert_eq!(updated.title, "Piano", "{label}");
    }
}

#[tokio::test]
async fn mark_message_as_read_is_idempotent() {
    for (label, storage) in backends().await {
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
        assert_eq!(
            storage.get_unread_messages_count(bob.id).await.unwrap(),
            1,
            "{label}"
        );

        assert!(storage.mark_message_as_read(message.id).await.unwrap(), "{label}");
        assert!(storage.mark_message_as_read(message.id).await.unwrap(), "{label}");
        assert_eq!(
            storage.get_unread_messages_count(bob.id).await.unwrap(),
            0,
            "{label}"
        );
    }
}

#[tokio::test]
async fn active_exchanges_exclude_pending_and_terminal() {
    for (label, storage) in backends().await {
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
        for (id, status) in [
            (ids[1], ExchangeStatus::Accepted),
            (ids[2], ExchangeStatus::InProgress),
            (ids[3], ExchangeStatus::Completed),
        ] {
            storage.update_exchange_status(id, status).await.unwrap();
        }

        let active = storage.get_active_exchanges_by_user(alice.id).await.unwrap();
        let active_ids: Vec<i64> = active.iter().map(|e| e.id).collect();
        assert_eq!(active.len(), 2, "{label}");
        assert!(active_ids.contains(&ids[1]), "{label}");
        assert!(active_ids.contains(&ids[2]), "{label}");
    }
}

#[tokio::test]
async fn average_rating_is_zero_without_reviews_and_rounded() {
    for (label, storage) in backends().await {
        let alice = storage.create_user(new_user("alice")).await.unwrap();
        let bob = storage.create_user(new_user("bob")).await.unwrap();
        assert_eq!(
            storage.get_average_rating_for_user(alice.id).await.unwrap(),
            0.0,
            "{label}"
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
        for rating in [3, 4] {
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
            3.5,
            "{label}"
        );
    }
}

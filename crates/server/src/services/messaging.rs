use std::collections::HashMap;

use crate::db::models::Message;

/// One per-partner thread of a user's inbox. Messages are newest-first, as
/// consumed by the conversation-list preview; the single-conversation view
/// uses the ascending order of `Storage::get_conversation` instead.
#[derive(Debug)]
pub struct Conversation {
    pub partner_id: i64,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn latest_activity(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.messages.first().map(|m| m.created_at)
    }
}

/// Group a user's flat message list into conversations keyed by the other
/// participant, ordered by most recent activity, descending.
pub fn group_conversations(user_id: i64, messages: Vec<Message>) -> Vec<Conversation> {
    let mut by_partner: HashMap<i64, Vec<Message>> = HashMap::new();
    for message in messages {
        let partner_id = if message.sender_id == user_id {
            message.receiver_id
        } else {
            message.sender_id
        };
        by_partner.entry(partner_id).or_default().push(message);
    }

    let mut conversations: Vec<Conversation> = by_partner
        .into_iter()
        .map(|(partner_id, mut messages)| {
            messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Conversation {
                partner_id,
                messages,
            }
        })
        .collect();
    conversations.sort_by(|a, b| b.latest_activity().cmp(&a.latest_activity()));
    conversations
}

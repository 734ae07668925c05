use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Message;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of newly appended chat messages to live WebSocket subscribers.
///
/// One channel carries every chat; subscribers filter on `chat_id`. Slow
/// receivers that lag past the channel capacity skip ahead.
#[derive(Clone)]
pub struct ChatHub {
    tx: broadcast::Sender<Message>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Returns how many subscribers saw the message.
    pub fn publish(&self, message: Message) -> usize {
        // No receivers is the common case and not an error.
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ChatSubscription {
        ChatSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct ChatSubscription {
    rx: broadcast::Receiver<Message>,
}

impl ChatSubscription {
    /// Next message for `chat_id`, or `None` once the hub is gone.
    pub async fn next_for(&mut self, chat_id: Uuid) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.chat_id == chat_id => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Chat subscriber for {} lagged by {} messages", chat_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(chat_id: Uuid, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: Uuid::new_v4(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_chat() {
        let hub = ChatHub::new();
        let chat = Uuid::new_v4();
        let mut sub = hub.subscribe();

        hub.publish(message(Uuid::new_v4(), "elsewhere"));
        hub.publish(message(chat, "hello"));

        let got = sub.next_for(chat).await.unwrap();
        assert_eq!(got.content, "hello");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let hub = ChatHub::new();
        assert_eq!(hub.publish(message(Uuid::new_v4(), "nobody listening")), 0);
    }
}

//! Typed helpers for the portal's direct messages.

use tracing::{debug, error};

use eadms_protocol::messaging::{
    ChatMessage, MessageId, SendMessageRequest, UserId, destinations,
};

use crate::manager::SubscriptionManager;

impl SubscriptionManager {
    /// Subscribes to messages sent to or by `user_id`.
    pub fn subscribe_messages<F>(&self, user_id: UserId, on_message: F)
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.subscribe(&destinations::user_messages(user_id), on_message);
    }

    /// Subscribes to read receipts for messages sent by `user_id`.
    pub fn subscribe_read_receipts<F>(&self, user_id: UserId, on_read: F)
    where
        F: Fn(MessageId) + Send + Sync + 'static,
    {
        self.subscribe(&destinations::user_message_read(user_id), on_read);
    }

    /// Releases both personal queues of `user_id`.
    pub fn unsubscribe_user(&self, user_id: UserId) {
        self.unsubscribe(&destinations::user_messages(user_id));
        self.unsubscribe(&destinations::user_message_read(user_id));
    }

    /// Publishes a chat message. Invalid requests are logged and dropped.
    pub fn send_message(&self, request: &SendMessageRequest) {
        if let Err(e) = request.validate() {
            error!(receiver = request.receiver_id, error = %e, "refusing to send invalid message");
            return;
        }
        debug!(receiver = request.receiver_id, "sending chat message");
        self.send(destinations::CHAT_SEND, request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::settings::Settings;
    use crate::testutil::{MockConnector, capture_logs};

    fn connected() -> (SubscriptionManager, Arc<MockConnector>) {
        let connector = Arc::new(MockConnector::default());
        let manager = SubscriptionManager::new(Settings::default(), connector.clone());
        manager.connect("tok-1", None, None);
        (connector.last().callbacks.on_connect)();
        (manager, connector)
    }

    const PUSHED: &str = r#"{
        "id": 5, "senderId": 3, "senderName": "Ada", "senderEmail": "ada@school.test",
        "receiverId": 42, "receiverName": "Sam", "receiverEmail": "sam@school.test",
        "subject": "Homework", "content": "Due Friday", "isRead": false,
        "sentAt": "2024-03-05T09:30:00"
    }"#;

    #[test]
    fn messages_are_decoded() {
        let (manager, connector) = connected();
        let transport = connector.last().transport;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        manager.subscribe_messages(42, move |m| sink.lock().unwrap().push(m));
        transport.deliver("/user/42/queue/messages", PUSHED);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, 5);
        assert_eq!(seen[0].subject, "Homework");
    }

    #[test]
    fn read_receipts_are_bare_ids() {
        let (manager, connector) = connected();
        let transport = connector.last().transport;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        manager.subscribe_read_receipts(42, move |id| sink.lock().unwrap().push(id));
        transport.deliver("/user/42/queue/message-read", "17");

        assert_eq!(*seen.lock().unwrap(), vec![17]);
    }

    #[test]
    fn unsubscribe_user_releases_both_queues() {
        let (manager, connector) = connected();
        manager.subscribe_messages(42, |_| {});
        manager.subscribe_read_receipts(42, |_| {});

        manager.unsubscribe_user(42);

        assert!(manager.topics().is_empty());
        assert!(connector.last().transport.active_destinations().is_empty());
    }

    #[test]
    fn send_message_publishes_to_chat_send() {
        let (manager, connector) = connected();
        manager.send_message(&SendMessageRequest {
            receiver_id: 42,
            subject: "Hi".into(),
            content: "Hello".into(),
        });

        assert_eq!(
            connector.last().transport.published(),
            vec![(
                "/app/chat.send".to_string(),
                r#"{"receiverId":42,"subject":"Hi","content":"Hello"}"#.to_string()
            )]
        );
    }

    #[test]
    fn invalid_message_is_dropped() {
        let (manager, connector) = connected();
        let ((), logs) = capture_logs(|| {
            manager.send_message(&SendMessageRequest {
                receiver_id: 42,
                subject: " ".into(),
                content: "Hello".into(),
            })
        });

        assert!(logs.contains("refusing to send invalid message"));
        assert!(logs.contains("subject is required"));
        assert!(connector.last().transport.published().is_empty());
    }
}

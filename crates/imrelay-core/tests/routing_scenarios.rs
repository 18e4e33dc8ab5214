//! End-to-end routing scenarios over a real registry.

use std::sync::Arc;

use imrelay_core::{
    BroadcastReport, Connection, ConnectionRegistry, MessageRouter, OutboundMessage, Relay,
    RouterConfig, RoutingResult, SendResult,
};
use tokio::sync::mpsc;

struct Client {
    connection: Connection,
    rx: mpsc::Receiver<OutboundMessage>,
}

impl Client {
    fn new(user: &str) -> Self {
        let (connection, rx) = Connection::channel(user, 32);
        Self { connection, rx }
    }

    fn received(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg.into_text());
        }
        out
    }
}

fn router_with(clients: &[&Client]) -> MessageRouter {
    let registry = Arc::new(ConnectionRegistry::new());
    for client in clients {
        registry.register(client.connection.clone());
    }
    MessageRouter::new(RouterConfig::new(), registry)
}

#[tokio::test]
async fn directed_send_reaches_recipient_and_sender_plus_broadcast() {
    let mut a = Client::new("A");
    let mut b = Client::new("B");
    let mut c = Client::new("C");
    let router = router_with(&[&a, &b, &c]);

    let result = router.handle_inbound("A", r#"{"toUserId":"B","x":1}"#).await;

    assert_eq!(
        result,
        RoutingResult::Directed {
            broadcast: BroadcastReport { delivered: 3, failed: 0 },
            recipient: SendResult::Sent,
            echo: SendResult::Sent,
        }
    );

    let expected = r#"{"fromUserId":"A","toUserId":"B","x":1}"#;
    // Broadcast copy first, then the direct copy
    assert_eq!(a.received(), vec![expected, expected]);
    assert_eq!(b.received(), vec![expected, expected]);
    assert_eq!(c.received(), vec![expected]);
}

#[tokio::test]
async fn offline_recipient_notifies_sender_only() {
    let mut a = Client::new("A");
    let router = router_with(&[&a]);

    let result = router.handle_inbound("A", r#"{"toUserId":"Z"}"#).await;

    assert_eq!(
        result,
        RoutingResult::RecipientOffline {
            broadcast: BroadcastReport { delivered: 1, failed: 0 },
            recipient: "Z".to_string(),
            notice: SendResult::Sent,
        }
    );
    assert_eq!(
        a.received(),
        vec![
            r#"{"fromUserId":"A","toUserId":"Z"}"#.to_string(),
            "Z当前用户占不在线！".to_string(),
        ]
    );
}

#[tokio::test]
async fn offline_notice_is_not_sent_to_bystanders() {
    let mut a = Client::new("A");
    let mut b = Client::new("B");
    let router = router_with(&[&a, &b]);

    router.handle_inbound("A", r#"{"toUserId":"Z","body":"ping"}"#).await;

    let broadcast = r#"{"fromUserId":"A","toUserId":"Z","body":"ping"}"#;
    assert_eq!(b.received(), vec![broadcast]);
    assert_eq!(a.received().len(), 2);
}

#[tokio::test]
async fn forged_sender_is_overwritten() {
    let mut a = Client::new("A");
    let mut b = Client::new("B");
    let router = router_with(&[&a, &b]);

    router
        .handle_inbound("A", r#"{"fromUserId":"B","toUserId":"B","body":"hi"}"#)
        .await;

    for text in b.received().into_iter().chain(a.received()) {
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["fromUserId"], "A");
    }
}

#[tokio::test]
async fn dead_recipient_does_not_block_broadcast() {
    let mut a = Client::new("A");
    let b = Client::new("B");
    let mut c = Client::new("C");
    let router = router_with(&[&a, &b, &c]);
    let Client { rx: b_rx, .. } = b;
    drop(b_rx);

    let result = router.handle_inbound("A", r#"{"toUserId":"B"}"#).await;

    assert_eq!(
        result,
        RoutingResult::Directed {
            broadcast: BroadcastReport { delivered: 2, failed: 1 },
            recipient: SendResult::ChannelClosed,
            echo: SendResult::Sent,
        }
    );
    assert_eq!(c.received().len(), 1);
    assert_eq!(a.received().len(), 2);
    assert!(router.registry().contains("B"));
}

#[tokio::test]
async fn full_queue_only_affects_that_recipient() {
    let mut a = Client::new("A");
    let mut c = Client::new("C");
    let (slow, mut slow_rx) = Connection::channel("slow", 1);
    slow.send_nowait("backlog").unwrap();

    let registry = Arc::new(ConnectionRegistry::new());
    registry.register(a.connection.clone());
    registry.register(slow);
    registry.register(c.connection.clone());
    let router = MessageRouter::new(RouterConfig::new(), registry);

    let report = router.broadcast("hello");

    assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
    assert_eq!(a.received(), vec!["hello"]);
    assert_eq!(c.received(), vec!["hello"]);
    assert_eq!(slow_rx.try_recv().unwrap().text, "backlog");
    assert!(slow_rx.try_recv().is_err());
}

#[tokio::test]
async fn relay_lifecycle_round_trip() {
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Relay::new(Arc::clone(&registry), RouterConfig::new())
        .with_welcome_message(Some("welcome".to_string()));

    let mut a = Client::new("A");
    let mut b = Client::new("B");
    relay.on_connect(a.connection.clone()).await;
    relay.on_connect(b.connection.clone()).await;
    assert_eq!(registry.online_count(), 2);
    assert_eq!(a.received(), vec!["welcome"]);
    assert_eq!(b.received(), vec!["welcome"]);

    let result = relay.on_message("B", r#"{"toUserId":"A","n":7}"#).await;
    assert!(matches!(result, RoutingResult::Directed { .. }));
    assert_eq!(a.received().len(), 2);
    assert_eq!(b.received().len(), 2);

    relay.on_disconnect("A", a.connection.connection_id());
    assert_eq!(registry.online_count(), 1);

    let result = relay.on_message("B", r#"{"toUserId":"A"}"#).await;
    assert!(matches!(result, RoutingResult::RecipientOffline { .. }));
    assert!(a.received().is_empty());
    assert_eq!(
        b.received(),
        vec![
            r#"{"fromUserId":"B","toUserId":"A"}"#.to_string(),
            "A当前用户占不在线！".to_string(),
        ]
    );
}

#[tokio::test]
async fn unregister_unknown_user_is_noop() {
    let a = Client::new("A");
    let router = router_with(&[&a]);

    assert!(router.registry().unregister("ghost").is_none());
    assert_eq!(router.registry().online_count(), 1);
}

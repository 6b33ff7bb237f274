use std::sync::Arc;
use tokio::sync::mpsc;
use warp::ws::Message;

use crate::catalog::TemplateCatalog;
use crate::error::CodeshareError;
use crate::room::coordinator::RoomCoordinator;
use crate::room::gateway::{BroadcastGateway, ConnectionId};
use crate::room::signaling::{ClientMessage, ServerMessage};
use crate::room::throttle::Throttle;
use crate::store::RoomStore;

pub const EVENT_JOIN: &str = "join";
pub const EVENT_UPDATE_CODE: &str = "update_code";
pub const EVENT_LEAVE: &str = "leave";

/// The (room, user) pair a connection is currently bound to. Set on a
/// successful join, used for cleanup when the socket drops without an
/// explicit leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionBinding {
    pub room_id: String,
    pub user_id: String,
}

/// Wires throttle, coordinator and gateway together: one inbound
/// client event in, zero or more emissions out. Every failure is
/// scoped to the single offending room/operation.
pub struct RoomServer {
    coordinator: RoomCoordinator,
    gateway: BroadcastGateway,
    throttle: Throttle,
}

impl RoomServer {
    pub fn new(
        store: Arc<dyn RoomStore>,
        catalog: Arc<TemplateCatalog>,
        throttle: Throttle,
    ) -> Self {
        Self {
            coordinator: RoomCoordinator::new(store, catalog),
            gateway: BroadcastGateway::new(),
            throttle,
        }
    }

    /// Dispatches one client message. `binding` tracks which room and
    /// user this connection is acting as.
    pub async fn handle_message(
        &self,
        connection_id: ConnectionId,
        sender: &mpsc::UnboundedSender<Message>,
        message: ClientMessage,
        binding: &mut Option<ConnectionBinding>,
    ) {
        match message {
            ClientMessage::Join { room, user_id } => {
                self.handle_join(connection_id, sender, &room, &user_id, binding)
                    .await;
            }
            ClientMessage::UpdateCode {
                room,
                user_id,
                code,
            } => {
                self.handle_update_code(sender, &room, &user_id, code).await;
            }
            ClientMessage::Leave { room, user_id } => {
                self.handle_leave(connection_id, sender, &room, &user_id, binding)
                    .await;
            }
        }
    }

    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        sender: &mpsc::UnboundedSender<Message>,
        room_id: &str,
        user_id: &str,
        binding: &mut Option<ConnectionBinding>,
    ) {
        if !self.throttle.allow(EVENT_JOIN) {
            return;
        }

        // A join while bound elsewhere is an implicit leave of the
        // previous (room, user); otherwise the old participant entry
        // and subscription would outlive the connection's interest.
        let mut already_subscribed = false;
        if let Some(previous) = binding.clone() {
            if previous.room_id == room_id && previous.user_id == user_id {
                already_subscribed = true;
            } else {
                self.depart(
                    connection_id,
                    &previous.room_id,
                    &previous.user_id,
                    Some(sender),
                )
                .await;
                *binding = None;
            }
        }

        // Subscribe before reading state so concurrent updates from
        // other participants are not missed; the join reply itself
        // still reflects the snapshot read below.
        self.gateway
            .subscribe(room_id, connection_id, sender.clone())
            .await;

        match self.coordinator.join(room_id, user_id).await {
            Ok(reply) => {
                *binding = Some(ConnectionBinding {
                    room_id: room_id.to_string(),
                    user_id: user_id.to_string(),
                });

                self.reply(
                    sender,
                    &ServerMessage::Joined {
                        role: reply.role,
                        code: reply.code,
                    },
                );

                if let Some(view) = reply.student_view {
                    self.reply(sender, &ServerMessage::MentorView { students: view });
                }
            }
            Err(err) => {
                // The failed join never happened: drop the tentative
                // subscription (unless this connection was already in
                // the room from an earlier join) and tell only the
                // requester.
                if !already_subscribed {
                    self.gateway.unsubscribe(room_id, connection_id).await;
                }
                self.report_error(sender, room_id, user_id, err);
            }
        }
    }

    async fn handle_update_code(
        &self,
        sender: &mpsc::UnboundedSender<Message>,
        room_id: &str,
        user_id: &str,
        code: String,
    ) {
        if !self.throttle.allow(EVENT_UPDATE_CODE) {
            return;
        }

        match self.coordinator.update_code(room_id, user_id, code).await {
            Ok(Some(update)) => {
                let message = ServerMessage::CodeUpdated {
                    user_id: update.user_id,
                    student_name: update.student_name,
                    code: update.code,
                };
                if let Err(err) = self.gateway.broadcast(room_id, &message).await {
                    tracing::error!(room_id = %room_id, error = %err, "Failed to broadcast code update");
                }
            }
            Ok(None) => {
                // Stale update: silently dropped by policy.
            }
            Err(err) => {
                self.report_error(sender, room_id, user_id, err);
            }
        }
    }

    async fn handle_leave(
        &self,
        connection_id: ConnectionId,
        sender: &mpsc::UnboundedSender<Message>,
        room_id: &str,
        user_id: &str,
        binding: &mut Option<ConnectionBinding>,
    ) {
        if !self.throttle.allow(EVENT_LEAVE) {
            return;
        }
        self.depart(connection_id, room_id, user_id, Some(sender))
            .await;

        if binding
            .as_ref()
            .map(|b| b.room_id == room_id && b.user_id == user_id)
            .unwrap_or(false)
        {
            *binding = None;
        }
    }

    /// Cleanup for a socket that closed without an explicit leave.
    pub async fn handle_disconnect(
        &self,
        connection_id: ConnectionId,
        binding: Option<ConnectionBinding>,
    ) {
        if let Some(binding) = binding {
            tracing::debug!(
                room_id = %binding.room_id,
                user_id = %binding.user_id,
                connection_id,
                "Connection dropped without leave, cleaning up"
            );
            self.depart(connection_id, &binding.room_id, &binding.user_id, None)
                .await;
        }
    }

    /// Shared leave path: persist the removal when the user exists,
    /// unsubscribe the connection, then broadcast "left" regardless of
    /// whether the user was found. A store failure is reported
    /// privately when the requester's channel is still available
    /// (disconnect cleanup has none) but does not suppress the
    /// best-effort notification.
    async fn depart(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        user_id: &str,
        sender: Option<&mpsc::UnboundedSender<Message>>,
    ) {
        if let Err(err) = self.coordinator.leave(room_id, user_id).await {
            match sender {
                Some(sender) => self.report_error(sender, room_id, user_id, err),
                None => tracing::error!(
                    room_id = %room_id,
                    user_id = %user_id,
                    error = %err,
                    "Leave could not be persisted"
                ),
            }
        }

        self.gateway.unsubscribe(room_id, connection_id).await;

        let message = ServerMessage::Left {
            user_id: user_id.to_string(),
        };
        if let Err(err) = self.gateway.broadcast(room_id, &message).await {
            tracing::error!(room_id = %room_id, error = %err, "Failed to broadcast leave");
        }
    }

    fn reply(&self, sender: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
        if let Err(err) = BroadcastGateway::send_to(sender, message) {
            tracing::error!(error = %err, "Failed to serialize private reply");
        }
    }

    fn report_error(
        &self,
        sender: &mpsc::UnboundedSender<Message>,
        room_id: &str,
        user_id: &str,
        err: CodeshareError,
    ) {
        tracing::error!(room_id = %room_id, user_id = %user_id, error = %err, "Operation failed");
        self.reply(
            sender,
            &ServerMessage::Error {
                message: "internal server error".to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::model::Role;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::time::Duration;

    fn server() -> RoomServer {
        RoomServer::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateCatalog::new()),
            Throttle::default(),
        )
    }

    fn channel() -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        mpsc::unbounded_channel()
    }

    fn parse(message: Message) -> ServerMessage {
        serde_json::from_str(message.to_str().unwrap()).unwrap()
    }

    async fn join(
        server: &RoomServer,
        connection_id: ConnectionId,
        sender: &mpsc::UnboundedSender<Message>,
        room: &str,
        user: &str,
    ) -> Option<ConnectionBinding> {
        let mut binding = None;
        server
            .handle_message(
                connection_id,
                sender,
                ClientMessage::Join {
                    room: room.to_string(),
                    user_id: user.to_string(),
                },
                &mut binding,
            )
            .await;
        binding
    }

    #[tokio::test]
    async fn test_join_replies_privately_and_binds_connection() {
        let server = server();
        let (tx, mut rx) = channel();
        let binding = join(&server, 1, &tx, "2", "alice").await;

        assert_eq!(
            binding,
            Some(ConnectionBinding {
                room_id: "2".to_string(),
                user_id: "alice".to_string(),
            })
        );
        match parse(rx.recv().await.unwrap()) {
            ServerMessage::Joined { role, code } => {
                assert_eq!(role, Role::Mentor);
                assert_eq!(code, "");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mentor_rejoin_receives_student_view() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        let (student_tx, _student_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        join(&server, 2, &student_tx, "2", "b").await;
        mentor_rx.recv().await.unwrap(); // first joined reply

        join(&server, 1, &mentor_tx, "2", "m").await;
        parse(mentor_rx.recv().await.unwrap()); // joined
        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::MentorView { students } => {
                assert_eq!(students[0].0, "Student 1");
                assert!(students[0].1.contains("findMax"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mentor_view_stays_in_join_order_past_nine_students() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        join(&server, 0, &mentor_tx, "2", "m").await;
        mentor_rx.recv().await.unwrap();

        for n in 1..=10u64 {
            let (student_tx, _student_rx) = channel();
            join(&server, n, &student_tx, "2", &format!("user-{}", n)).await;
        }

        join(&server, 0, &mentor_tx, "2", "m").await;
        parse(mentor_rx.recv().await.unwrap()); // joined
        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::MentorView { students } => {
                assert_eq!(students.len(), 10);
                assert_eq!(students[1].0, "Student 2");
                assert_eq!(students[9].0, "Student 10");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_echoes_to_sender_and_room() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        let (student_tx, mut student_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        let mut binding = join(&server, 2, &student_tx, "2", "b").await;
        mentor_rx.recv().await.unwrap();
        student_rx.recv().await.unwrap();

        server
            .handle_message(
                2,
                &student_tx,
                ClientMessage::UpdateCode {
                    room: "2".to_string(),
                    user_id: "b".to_string(),
                    code: "return max".to_string(),
                },
                &mut binding,
            )
            .await;

        for rx in [&mut mentor_rx, &mut student_rx] {
            match parse(rx.recv().await.unwrap()) {
                ServerMessage::CodeUpdated {
                    user_id,
                    student_name,
                    code,
                } => {
                    assert_eq!(user_id, "b");
                    assert_eq!(student_name, "Student 1");
                    assert_eq!(code, "return max");
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_stale_update_produces_no_emission() {
        let server = server();
        let (tx, mut rx) = channel();
        let mut binding = None;
        server
            .handle_message(
                1,
                &tx,
                ClientMessage::UpdateCode {
                    room: "ghost".to_string(),
                    user_id: "nobody".to_string(),
                    code: "late".to_string(),
                },
                &mut binding,
            )
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_broadcasts_even_for_unknown_user() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        mentor_rx.recv().await.unwrap();

        let (ghost_tx, _ghost_rx) = channel();
        let mut binding = None;
        server
            .handle_message(
                2,
                &ghost_tx,
                ClientMessage::Leave {
                    room: "2".to_string(),
                    user_id: "ghost".to_string(),
                },
                &mut binding,
            )
            .await;

        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::Left { user_id } => assert_eq!(user_id, "ghost"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_leaver_does_not_receive_own_left_broadcast() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        let (student_tx, mut student_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        let mut binding = join(&server, 2, &student_tx, "2", "b").await;
        mentor_rx.recv().await.unwrap();
        student_rx.recv().await.unwrap();

        server
            .handle_message(
                2,
                &student_tx,
                ClientMessage::Leave {
                    room: "2".to_string(),
                    user_id: "b".to_string(),
                },
                &mut binding,
            )
            .await;

        assert!(binding.is_none());
        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::Left { user_id } => assert_eq!(user_id, "b"),
            other => panic!("unexpected message: {:?}", other),
        }
        // The leaver was unsubscribed before the broadcast.
        assert!(student_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_leave_cleans_up() {
        let server = server();
        let (mentor_tx, mut mentor_rx) = channel();
        let (student_tx, _student_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        let binding = join(&server, 2, &student_tx, "2", "b").await;
        mentor_rx.recv().await.unwrap();

        server.handle_disconnect(2, binding).await;

        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::Left { user_id } => assert_eq!(user_id, "b"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejoining_a_different_room_leaves_the_previous_one() {
        let server = server();
        let (observer_tx, mut observer_rx) = channel();
        let (roamer_tx, mut roamer_rx) = channel();
        join(&server, 1, &observer_tx, "2", "m").await;
        observer_rx.recv().await.unwrap();

        let mut binding = join(&server, 2, &roamer_tx, "2", "b").await;
        roamer_rx.recv().await.unwrap();

        server
            .handle_message(
                2,
                &roamer_tx,
                ClientMessage::Join {
                    room: "3".to_string(),
                    user_id: "b".to_string(),
                },
                &mut binding,
            )
            .await;

        assert_eq!(
            binding,
            Some(ConnectionBinding {
                room_id: "3".to_string(),
                user_id: "b".to_string(),
            })
        );
        // The old room saw the implicit leave.
        match parse(observer_rx.recv().await.unwrap()) {
            ServerMessage::Left { user_id } => assert_eq!(user_id, "b"),
            other => panic!("unexpected message: {:?}", other),
        }
        // The connection no longer receives old-room broadcasts.
        server
            .handle_message(
                1,
                &observer_tx,
                ClientMessage::UpdateCode {
                    room: "2".to_string(),
                    user_id: "m".to_string(),
                    code: "notes".to_string(),
                },
                &mut None,
            )
            .await;
        match parse(roamer_rx.recv().await.unwrap()) {
            ServerMessage::Joined { .. } => {}
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(roamer_rx.try_recv().is_err());
    }

    /// Store wrapper whose upsert can be flipped into failure mode.
    struct FlakyStore {
        inner: MemoryStore,
        fail_upsert: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_upsert: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl crate::store::RoomStore for FlakyStore {
        async fn get(&self, room_id: &str) -> crate::error::Result<Option<crate::room::model::Room>> {
            self.inner.get(room_id).await
        }

        async fn upsert(
            &self,
            room_id: &str,
            room: &crate::room::model::Room,
        ) -> crate::error::Result<()> {
            if self.fail_upsert.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::CodeshareError::store("upsert refused"));
            }
            self.inner.upsert(room_id, room).await
        }
    }

    #[tokio::test]
    async fn test_leave_store_failure_is_reported_to_the_requester() {
        let store = Arc::new(FlakyStore::new());
        let server = RoomServer::new(
            store.clone(),
            Arc::new(TemplateCatalog::new()),
            Throttle::default(),
        );
        let (mentor_tx, mut mentor_rx) = channel();
        let (student_tx, mut student_rx) = channel();
        join(&server, 1, &mentor_tx, "2", "m").await;
        let mut binding = join(&server, 2, &student_tx, "2", "b").await;
        mentor_rx.recv().await.unwrap();
        student_rx.recv().await.unwrap();

        store
            .fail_upsert
            .store(true, std::sync::atomic::Ordering::SeqCst);
        server
            .handle_message(
                2,
                &student_tx,
                ClientMessage::Leave {
                    room: "2".to_string(),
                    user_id: "b".to_string(),
                },
                &mut binding,
            )
            .await;

        // The requester hears about the failure privately.
        match parse(student_rx.recv().await.unwrap()) {
            ServerMessage::Error { message } => assert_eq!(message, "internal server error"),
            other => panic!("unexpected message: {:?}", other),
        }
        // The best-effort notification still reaches the room.
        match parse(mentor_rx.recv().await.unwrap()) {
            ServerMessage::Left { user_id } => assert_eq!(user_id, "b"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_throttled_update_is_dropped_silently() {
        let mut windows = HashMap::new();
        windows.insert(EVENT_UPDATE_CODE, Duration::from_secs(60));
        let server = RoomServer::new(
            Arc::new(MemoryStore::new()),
            Arc::new(TemplateCatalog::new()),
            Throttle::new(windows),
        );

        let (tx, mut rx) = channel();
        let mut binding = join(&server, 1, &tx, "2", "m").await;
        rx.recv().await.unwrap();

        for code in ["first", "second"] {
            server
                .handle_message(
                    1,
                    &tx,
                    ClientMessage::UpdateCode {
                        room: "2".to_string(),
                        user_id: "m".to_string(),
                        code: code.to_string(),
                    },
                    &mut binding,
                )
                .await;
        }

        // First update admitted and echoed; second dropped with no
        // reply of any kind.
        match parse(rx.recv().await.unwrap()) {
            ServerMessage::CodeUpdated { code, .. } => assert_eq!(code, "first"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}

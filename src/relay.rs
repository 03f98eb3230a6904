//! Inbound relay handler: the backend side of the bridge
//!
//! Decodes relay messages arriving on the bridge channel, drops those
//! addressed to another server, and runs the rest locally.

use crate::config::BridgeConfig;
use crate::host::{InboundHandler, LocalExecutor, Transport};
use crate::protocol::RelayFrame;
use crate::types::{ExecutorKind, SenderContext};
use async_trait::async_trait;
use std::sync::Arc;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Message was on another channel
    IgnoredChannel,
    /// Payload could not be decoded
    Malformed,
    /// Sub-channel this version does not handle
    Unsupported(String),
    /// Addressed to a different server
    NotForThisServer,
    /// Player execution requested but no actor carried the message
    MissingActor,
    /// Local execution returned an error
    Failed,
    /// Command was executed
    Executed(ExecutorKind),
}

/// Executes relay messages addressed to this server
pub struct RelayHandler {
    server_id: String,
    channel: String,
    executor: Arc<dyn LocalExecutor>,
}

impl RelayHandler {
    /// Create a handler for the process described by `config`
    pub fn new(config: &BridgeConfig, executor: Arc<dyn LocalExecutor>) -> Self {
        Self {
            server_id: config.server_id.clone(),
            channel: config.channel.clone(),
            executor,
        }
    }

    /// Register this handler on a transport endpoint
    pub fn attach(self: Arc<Self>, transport: &dyn Transport) {
        tracing::info!(
            server = %self.server_id,
            channel = %self.channel,
            "Relay handler attached"
        );
        transport.register_handler(self);
    }

    /// Process one inbound message
    pub async fn handle(
        &self,
        channel: &str,
        sender: &SenderContext,
        payload: &[u8],
    ) -> InboundOutcome {
        if channel != self.channel {
            return InboundOutcome::IgnoredChannel;
        }

        let message = match RelayFrame::decode(payload) {
            Ok(RelayFrame::Execute(message)) => message,
            Ok(RelayFrame::Unknown { sub_channel }) => {
                tracing::debug!(origin = %sender.origin, sub_channel = %sub_channel, "Ignoring unknown sub-channel");
                return InboundOutcome::Unsupported(sub_channel);
            }
            Err(e) => {
                tracing::warn!(origin = %sender.origin, error = %e, "Dropping malformed relay message");
                return InboundOutcome::Malformed;
            }
        };

        if message.destination != self.server_id {
            tracing::debug!(
                destination = %message.destination,
                server = %self.server_id,
                "Relay message not for this server"
            );
            return InboundOutcome::NotForThisServer;
        }

        tracing::info!(
            origin = %sender.origin,
            executor = %message.executor,
            text = %message.command,
            "Executing relayed command"
        );

        let result = match message.executor {
            ExecutorKind::User => {
                let Some(actor) = &sender.actor else {
                    tracing::warn!(
                        origin = %sender.origin,
                        text = %message.command,
                        "Player command arrived without a player connection, dropped"
                    );
                    return InboundOutcome::MissingActor;
                };
                self.executor.run_as_user(actor, &message.command).await
            }
            ExecutorKind::System => self.executor.run_as_system(&message.command).await,
        };

        match result {
            Ok(()) => InboundOutcome::Executed(message.executor),
            Err(e) => {
                tracing::error!(text = %message.command, error = %e, "Relayed command failed");
                InboundOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl InboundHandler for RelayHandler {
    async fn on_receive(&self, channel: &str, sender: &SenderContext, payload: &[u8]) {
        self.handle(channel, sender, payload).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::RecordingExecutor;
    use crate::protocol::RelayMessage;
    use crate::types::Actor;
    use uuid::Uuid;

    fn backend(server_id: &str) -> (RelayHandler, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::new());
        let handler = RelayHandler::new(&BridgeConfig::for_server(server_id), executor.clone());
        (handler, executor)
    }

    fn from_proxy(actor: Option<Actor>) -> SenderContext {
        SenderContext {
            origin: "proxy-1".to_string(),
            actor,
        }
    }

    fn encoded(destination: &str, executor: ExecutorKind, command: &str) -> Vec<u8> {
        RelayMessage::new(destination, executor, command)
            .encode()
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_console_command_executed() {
        let (handler, executor) = backend("lobby-2");
        let payload = encoded("lobby-2", ExecutorKind::System, "broadcast hi");

        let outcome = handler.handle("commandbridge:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::Executed(ExecutorKind::System));
        assert_eq!(executor.commands(), vec!["broadcast hi"]);
    }

    #[tokio::test]
    async fn test_other_destination_filtered() {
        let (handler, executor) = backend("lobby-2");
        let payload = encoded("lobby-9", ExecutorKind::System, "stop");

        let outcome = handler.handle("commandbridge:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::NotForThisServer);
        assert!(executor.executions().is_empty());
    }

    #[tokio::test]
    async fn test_other_channel_ignored() {
        let (handler, executor) = backend("lobby-2");
        let payload = encoded("lobby-2", ExecutorKind::System, "stop");

        let outcome = handler.handle("bungeecord:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::IgnoredChannel);
        assert!(executor.executions().is_empty());
    }

    #[tokio::test]
    async fn test_player_command_uses_sender_actor() {
        let (handler, executor) = backend("lobby-2");
        let actor = Actor::new(Uuid::new_v4(), "Alice");
        let payload = encoded("lobby-2", ExecutorKind::User, "spawn");

        let outcome = handler
            .handle("commandbridge:main", &from_proxy(Some(actor.clone())), &payload)
            .await;

        assert_eq!(outcome, InboundOutcome::Executed(ExecutorKind::User));
        let runs = executor.executions();
        assert_eq!(runs[0].actor, Some(actor.id));
        assert_eq!(runs[0].command, "spawn");
    }

    #[tokio::test]
    async fn test_player_command_without_actor_dropped() {
        let (handler, executor) = backend("lobby-2");
        let payload = encoded("lobby-2", ExecutorKind::User, "spawn");

        let outcome = handler.handle("commandbridge:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::MissingActor);
        assert!(executor.executions().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped() {
        let (handler, executor) = backend("lobby-2");
        let mut payload = encoded("lobby-2", ExecutorKind::System, "broadcast hi");
        payload.truncate(payload.len() - 3);

        let outcome = handler.handle("commandbridge:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::Malformed);
        assert!(executor.executions().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sub_channel_ignored() {
        let (handler, _) = backend("lobby-2");
        let payload = [0u8, 7, b'C', b'o', b'n', b'n', b'e', b'c', b't'];

        let outcome = handler.handle("commandbridge:main", &from_proxy(None), &payload).await;

        assert_eq!(outcome, InboundOutcome::Unsupported("Connect".to_string()));
    }

    #[tokio::test]
    async fn test_unavailable_actor_reports_failure() {
        let (handler, executor) = backend("lobby-2");
        let actor = Actor::new(Uuid::new_v4(), "Alice");
        executor.mark_unavailable(actor.id);
        let payload = encoded("lobby-2", ExecutorKind::User, "spawn");

        let outcome = handler
            .handle("commandbridge:main", &from_proxy(Some(actor)), &payload)
            .await;

        assert_eq!(outcome, InboundOutcome::Failed);
    }
}

//! Host platform seams: the collaborators the bridge drives
//!
//! The dispatch engine and relay handler never talk to a proxy or game
//! server directly. Each host binding implements these traits; `memory`
//! provides in-process implementations for single-process use and tests.

use crate::error::Result;
use crate::types::{Actor, Envelope, Invocation, SenderContext};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

/// Answers whether an actor is currently connected
#[async_trait]
pub trait PresenceOracle: Send + Sync {
    /// Is the actor connected anywhere (`server = None`) or to `server`?
    async fn is_present(&self, actor: Uuid, server: Option<&str>) -> bool;
}

/// Fire-and-forget byte channel between proxy and backends
///
/// `send` may be called concurrently from many step tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand an envelope to the transport; no delivery acknowledgement
    async fn send(&self, envelope: Envelope) -> Result<()>;

    /// Register a handler for every inbound message on this endpoint
    fn register_handler(&self, handler: Arc<dyn InboundHandler>);
}

/// Receiver of inbound transport messages
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Called once per inbound message
    async fn on_receive(&self, channel: &str, sender: &SenderContext, payload: &[u8]);
}

/// Runs command text on this process
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    /// Run as the given actor
    ///
    /// Returns `BridgeError::ActorUnavailable` if the actor cannot be
    /// resolved on this process.
    async fn run_as_user(&self, actor: &Actor, command: &str) -> Result<()>;

    /// Run unattended with elevated privilege
    async fn run_as_system(&self, command: &str) -> Result<()>;
}

/// Permission lookups and invoker feedback
pub trait AccessControl: Send + Sync {
    /// Does the actor hold the permission node?
    fn has_permission(&self, actor: &Actor, permission: &str) -> bool;

    /// Show a message to the invoker (`None` = console)
    fn notify(&self, actor: Option<&Actor>, message: &str);
}

/// Callback the host grammar invokes when a bound command is typed
///
/// Returns the number of steps scheduled.
pub type CommandHandler = Arc<dyn Fn(Invocation) -> Result<usize> + Send + Sync>;

/// The host's command-line grammar
pub trait CommandGrammar: Send + Sync {
    /// Bind `name` so that typing it calls `handler`
    fn register(&self, name: &str, handler: CommandHandler) -> Result<()>;

    /// Remove the binding for `name`
    fn unregister(&self, name: &str) -> Result<()>;
}

/// Collaborators used by the dispatch engine
#[derive(Clone)]
pub struct HostServices {
    pub presence: Arc<dyn PresenceOracle>,
    pub transport: Arc<dyn Transport>,
    pub executor: Arc<dyn LocalExecutor>,
    pub access: Arc<dyn AccessControl>,
}

//! In-memory host for development, testing, and single-process use
//!
//! Every collaborator trait has an in-process implementation here. A
//! `MemoryNetwork` links any number of `MemoryTransport` endpoints so a
//! proxy and several backends can run inside one test.

use super::{AccessControl, CommandGrammar, CommandHandler, InboundHandler, LocalExecutor, PresenceOracle, Transport};
use crate::error::{BridgeError, Result};
use crate::types::{Actor, Destination, Envelope, ExecutorKind, Invocation, SenderContext};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

/// Presence table keyed by actor id
#[derive(Default)]
pub struct MemoryPresence {
    online: RwLock<HashMap<Uuid, String>>,
}

impl MemoryPresence {
    /// Mark the actor as connected to `server`
    pub fn join(&self, actor: Uuid, server: impl Into<String>) {
        let mut online = self.online.write().unwrap_or_else(PoisonError::into_inner);
        online.insert(actor, server.into());
    }

    /// Mark the actor as disconnected
    pub fn leave(&self, actor: Uuid) {
        let mut online = self.online.write().unwrap_or_else(PoisonError::into_inner);
        online.remove(&actor);
    }
}

#[async_trait]
impl PresenceOracle for MemoryPresence {
    async fn is_present(&self, actor: Uuid, server: Option<&str>) -> bool {
        let online = self.online.read().unwrap_or_else(PoisonError::into_inner);
        match (online.get(&actor), server) {
            (Some(_), None) => true,
            (Some(current), Some(wanted)) => current == wanted,
            (None, _) => false,
        }
    }
}

/// Shared routing table linking memory transports
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<RwLock<HashMap<String, Vec<Arc<dyn InboundHandler>>>>>,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as `server_id`
    pub fn endpoint(&self, server_id: impl Into<String>) -> Arc<MemoryTransport> {
        let server_id = server_id.into();
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(server_id.clone())
            .or_default();
        Arc::new(MemoryTransport {
            server_id,
            network: self.clone(),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn handlers_for(&self, origin: &str, destination: &Destination) -> Option<Vec<Arc<dyn InboundHandler>>> {
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        match destination {
            Destination::Server(id) => endpoints.get(id).cloned(),
            Destination::Broadcast => Some(
                endpoints
                    .iter()
                    .filter(|(id, _)| id.as_str() != origin)
                    .flat_map(|(_, handlers)| handlers.iter().cloned())
                    .collect(),
            ),
        }
    }
}

/// One process's view of a `MemoryNetwork`
///
/// Delivers inline: `send` returns after every recipient handler ran.
pub struct MemoryTransport {
    server_id: String,
    network: MemoryNetwork,
    sent: Mutex<Vec<Envelope>>,
}

impl MemoryTransport {
    /// Server id of this endpoint
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Every envelope sent from this endpoint, in send order
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, envelope: Envelope) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());

        let handlers = self
            .network
            .handlers_for(&self.server_id, &envelope.destination)
            .ok_or_else(|| {
                BridgeError::Transport(format!("No route to {:?}", envelope.destination))
            })?;

        let sender = SenderContext {
            origin: self.server_id.clone(),
            actor: envelope.via.clone(),
        };
        for handler in handlers {
            handler
                .on_receive(&envelope.channel, &sender, &envelope.payload)
                .await;
        }
        Ok(())
    }

    fn register_handler(&self, handler: Arc<dyn InboundHandler>) {
        self.network
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(self.server_id.clone())
            .or_default()
            .push(handler);
    }
}

/// A command run by `RecordingExecutor`
#[derive(Debug, Clone)]
pub struct Execution {
    pub executor: ExecutorKind,
    pub actor: Option<Uuid>,
    pub command: String,
    pub at: Instant,
}

/// Executor that records commands instead of running them
#[derive(Default)]
pub struct RecordingExecutor {
    executions: Mutex<Vec<Execution>>,
    unavailable: RwLock<HashSet<Uuid>>,
}

impl RecordingExecutor {
    /// Create an executor that resolves every actor
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `run_as_user` fail for this actor
    pub fn mark_unavailable(&self, actor: Uuid) {
        self.unavailable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor);
    }

    /// Every recorded execution, in order
    pub fn executions(&self) -> Vec<Execution> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Just the command texts
    pub fn commands(&self) -> Vec<String> {
        self.executions().into_iter().map(|e| e.command).collect()
    }

    fn record(&self, executor: ExecutorKind, actor: Option<Uuid>, command: &str) {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Execution {
                executor,
                actor,
                command: command.to_string(),
                at: Instant::now(),
            });
    }
}

#[async_trait]
impl LocalExecutor for RecordingExecutor {
    async fn run_as_user(&self, actor: &Actor, command: &str) -> Result<()> {
        let unavailable = self
            .unavailable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&actor.id);
        if unavailable {
            return Err(BridgeError::ActorUnavailable(actor.to_string()));
        }
        self.record(ExecutorKind::User, Some(actor.id), command);
        Ok(())
    }

    async fn run_as_system(&self, command: &str) -> Result<()> {
        self.record(ExecutorKind::System, None, command);
        Ok(())
    }
}

/// Fixed permission grants plus a log of invoker notices
#[derive(Default)]
pub struct StaticAccess {
    allow_all: bool,
    grants: RwLock<HashSet<(Uuid, String)>>,
    notices: Mutex<Vec<(Option<Uuid>, String)>>,
}

impl StaticAccess {
    /// Deny everything not explicitly granted
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant every permission to every actor
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    /// Grant one permission node to one actor
    pub fn grant(&self, actor: Uuid, permission: impl Into<String>) {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((actor, permission.into()));
    }

    /// Messages shown to invokers, in order
    pub fn notices(&self) -> Vec<(Option<Uuid>, String)> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AccessControl for StaticAccess {
    fn has_permission(&self, actor: &Actor, permission: &str) -> bool {
        self.allow_all
            || self
                .grants
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&(actor.id, permission.to_string()))
    }

    fn notify(&self, actor: Option<&Actor>, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((actor.map(|a| a.id), message.to_string()));
    }
}

/// Command grammar backed by a name → handler map
#[derive(Default)]
pub struct MemoryGrammar {
    handlers: RwLock<HashMap<String, CommandHandler>>,
}

impl MemoryGrammar {
    /// Create an empty grammar
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a user typing the command
    pub fn invoke(&self, name: &str, invocation: Invocation) -> Result<usize> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))?;
        handler(invocation)
    }

    /// Currently bound names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl CommandGrammar for MemoryGrammar {
    fn register(&self, name: &str, handler: CommandHandler) -> Result<()> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.contains_key(name) {
            return Err(BridgeError::Config(format!(
                "Command '{}' is already registered",
                name
            )));
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    fn unregister(&self, name: &str) -> Result<()> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))
    }
}

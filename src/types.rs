//! Core command types for the commandbridge system
//!
//! A `CommandSpec` is the declarative definition of a named command;
//! an `Invocation` is one trigger of it. Both are host-agnostic.

use crate::error::{BridgeError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A connected entity that triggers or is impersonated by a command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    /// Stable unique id
    pub id: Uuid,

    /// Display name
    pub name: String,
}

impl Actor {
    /// Create a new actor
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Who a step's command runs as
///
/// Serialized with the wire tags used by the relay protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorKind {
    /// Run as the triggering actor
    #[default]
    #[serde(rename = "player", alias = "user")]
    User,
    /// Run unattended with elevated privilege
    #[serde(rename = "console", alias = "system")]
    System,
}

impl ExecutorKind {
    /// Wire tag for this executor kind
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::User => "player",
            Self::System => "console",
        }
    }

    /// Parse a wire tag
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "player" => Some(Self::User),
            "console" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Where a step runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Targets {
    /// This process only
    #[default]
    Local,
    /// The named backend processes (may include this one)
    Named(BTreeSet<String>),
}

impl Targets {
    /// Build targets from a list of server ids; an empty list means local
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Self::Local
        } else {
            Self::Named(set)
        }
    }

    /// Concrete server ids, substituting `local_id` for `Local`
    pub fn resolve(&self, local_id: &str) -> Vec<String> {
        match self {
            Self::Local => vec![local_id.to_string()],
            Self::Named(ids) => ids.iter().cloned().collect(),
        }
    }
}

/// One unit of work within a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    /// Command text, may contain placeholder tokens
    pub command: String,

    /// Seconds to wait before running; 0 runs on the step's turn
    pub delay_secs: u64,

    /// Processes the command runs on
    pub targets: Targets,

    /// Who the command runs as
    pub executor: ExecutorKind,

    /// Defer until the actor is connected
    pub wait_until_online: bool,

    /// Skip the per-target presence check before relaying
    pub disable_presence_check: bool,
}

impl CommandStep {
    /// A local, immediate step run as the triggering actor
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            delay_secs: 0,
            targets: Targets::Local,
            executor: ExecutorKind::User,
            wait_until_online: false,
            disable_presence_check: false,
        }
    }

    /// Set the delay in seconds
    pub fn with_delay(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set the target servers
    pub fn with_targets<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Targets::from_ids(ids);
        self
    }

    /// Set the executor kind
    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    /// Wait until the actor is online before running
    pub fn waiting_until_online(mut self) -> Self {
        self.wait_until_online = true;
        self
    }

    /// Relay without checking the actor is on the target server
    pub fn without_presence_check(mut self) -> Self {
        self.disable_presence_check = true;
        self
    }
}

/// A named command definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Unique command name
    pub name: String,

    /// Steps in declaration order
    pub steps: Vec<CommandStep>,

    /// Reject invocations that have no actor (console-origin)
    pub require_actor_is_user: bool,

    /// Skip the `<prefix><name>` permission check
    pub ignore_permission_check: bool,
}

impl CommandSpec {
    /// Create a command that requires a player and checks permissions
    pub fn new(name: impl Into<String>, steps: Vec<CommandStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            require_actor_is_user: true,
            ignore_permission_check: false,
        }
    }

    /// Accept console-origin invocations
    pub fn allow_console(mut self) -> Self {
        self.require_actor_is_user = false;
        self
    }

    /// Skip the permission check
    pub fn ignoring_permissions(mut self) -> Self {
        self.ignore_permission_check = true;
        self
    }

    /// Check the definition is runnable
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BridgeError::Config(
                "Command name is missing or empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(BridgeError::Config(format!(
                "Command '{}' has no steps",
                self.name
            )));
        }
        Ok(())
    }
}

/// One trigger of a command
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Triggering actor; `None` for console-origin invocations
    pub actor: Option<Actor>,

    /// Raw argument tokens
    pub args: Vec<String>,

    /// Groups every step spawned by this invocation in logs
    pub correlation_id: Uuid,
}

impl Invocation {
    /// Create an invocation with a fresh correlation id
    pub fn new(actor: Option<Actor>, args: Vec<String>) -> Self {
        Self {
            actor,
            args,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Invocation by a connected actor
    pub fn by(actor: Actor, args: Vec<String>) -> Self {
        Self::new(Some(actor), args)
    }

    /// Console-origin invocation
    pub fn console(args: Vec<String>) -> Self {
        Self::new(None, args)
    }

    /// Split the host's greedy argument string into tokens
    pub fn from_raw(actor: Option<Actor>, raw: &str) -> Self {
        let args = raw.split_whitespace().map(str::to_string).collect();
        Self::new(actor, args)
    }
}

/// Delivery metadata for an inbound message
#[derive(Debug, Clone, Default)]
pub struct SenderContext {
    /// Process the message came from
    pub origin: String,

    /// Actor whose connection carried the message
    pub actor: Option<Actor>,
}

/// Where an outbound message goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A single named process
    Server(String),
    /// Every connected process
    Broadcast,
}

/// Outbound transport unit
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Recipient
    pub destination: Destination,

    /// Logical channel identifier
    pub channel: String,

    /// Encoded message
    pub payload: Bytes,

    /// Actor whose connection should carry the message, when known
    pub via: Option<Actor>,
}

//! # commandbridge
//!
//! Cross-process command relay and dispatch for game-server fleets behind
//! a routing proxy.
//!
//! ## Overview
//!
//! An operator defines a named command once as a list of steps. When the
//! command is triggered on the proxy, each step is resolved against the
//! invoking actor and arguments, then run locally, relayed to named backend
//! servers, delayed, or held until the actor is online.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use commandbridge::host::memory::{MemoryGrammar, MemoryNetwork, MemoryPresence, RecordingExecutor, StaticAccess};
//! use commandbridge::{BridgeConfig, CommandRegistry, CommandSpec, CommandStep, Dispatcher, HostServices};
//!
//! # async fn example() -> commandbridge::Result<()> {
//! let network = MemoryNetwork::new();
//! let host = HostServices {
//!     presence: Arc::new(MemoryPresence::default()),
//!     transport: network.endpoint("proxy-1"),
//!     executor: Arc::new(RecordingExecutor::new()),
//!     access: Arc::new(StaticAccess::allow_all()),
//! };
//! let dispatcher = Dispatcher::new(BridgeConfig::for_server("proxy-1"), host);
//! let registry = CommandRegistry::new(dispatcher, Arc::new(MemoryGrammar::new()));
//!
//! registry.reload(vec![CommandSpec::new(
//!     "hub",
//!     vec![CommandStep::new("spawn %player%").with_targets(["lobby-1"])],
//! )]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Dispatcher** — validates invocations and schedules steps
//! - **RelayHandler** — backend side; executes relay messages addressed to it
//! - **CommandRegistry** — live command set, atomic reloads
//! - **host** traits — presence, transport, executor, access, grammar seams
//! - **protocol** — the `commandbridge:main` wire format

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod placeholder;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod scheduler;
pub mod scripts;
pub mod types;

// Re-export core types
pub use config::{BridgeConfig, PollConfig, DEFAULT_CHANNEL};
pub use dispatch::Dispatcher;
pub use error::{BridgeError, Result};
pub use host::{
    AccessControl, CommandGrammar, CommandHandler, HostServices, InboundHandler, LocalExecutor,
    PresenceOracle, Transport,
};
pub use protocol::{RelayFrame, RelayMessage, EXECUTE_COMMAND};
pub use registry::{CommandRegistry, ReloadReport};
pub use relay::{InboundOutcome, RelayHandler};
pub use scheduler::{PollState, TaskScheduler};
pub use types::{
    Actor, CommandSpec, CommandStep, Destination, Envelope, ExecutorKind, Invocation,
    SenderContext, Targets,
};

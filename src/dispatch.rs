//! Dispatch engine
//!
//! `Dispatcher::dispatch` validates an invocation against its command spec
//! and schedules one task per step. Each step task applies its own delay,
//! online-wait, and per-target presence policy, then either executes on this
//! process or relays a `RelayMessage` to a backend. Steps never wait on each
//! other; a failing step only ends itself.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::host::HostServices;
use crate::placeholder;
use crate::protocol::RelayMessage;
use crate::scheduler::{poll_until, PollState, TaskScheduler};
use crate::types::{Actor, CommandSpec, CommandStep, Destination, Envelope, ExecutorKind, Invocation};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use uuid::Uuid;

const MSG_MISCONFIGURED: &str = "This command is not configured correctly.";
const MSG_PLAYER_ONLY: &str = "This command can only be used by a player.";
const MSG_NO_PERMISSION: &str = "You do not have permission to use this command.";

/// Schedules command steps for execution
///
/// Cheap to clone; clones share the scheduler and collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: BridgeConfig,
    host: HostServices,
    scheduler: TaskScheduler,
}

/// A step with its command text already resolved
struct StepRun {
    command_name: String,
    index: usize,
    step: CommandStep,
    command: String,
    actor: Option<Actor>,
    correlation_id: Uuid,
}

impl Dispatcher {
    /// Create a dispatcher for the process described by `config`
    ///
    /// Step tasks run on the runtime current at this call, if any.
    pub fn new(config: BridgeConfig, host: HostServices) -> Self {
        Self::with_scheduler(config, host, TaskScheduler::new())
    }

    /// Create a dispatcher whose step tasks run on `runtime`
    pub fn with_runtime(config: BridgeConfig, host: HostServices, runtime: Handle) -> Self {
        Self::with_scheduler(config, host, TaskScheduler::with_runtime(runtime))
    }

    fn with_scheduler(config: BridgeConfig, host: HostServices, scheduler: TaskScheduler) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                host,
                scheduler,
            }),
        }
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Scheduler holding this dispatcher's step tasks
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.inner.scheduler
    }

    /// Validate `invocation` and schedule every step of `spec`
    ///
    /// Returns the number of steps scheduled. Errors mean no step was
    /// scheduled; the invoker has already been told why.
    pub fn dispatch(&self, spec: Arc<CommandSpec>, invocation: Invocation) -> Result<usize> {
        self.check_preconditions(&spec, &invocation)?;
        if let Err(e) = self.inner.scheduler.runtime() {
            tracing::error!(command = %spec.name, error = %e, "Command not dispatched");
            return Err(e);
        }

        let Invocation {
            actor,
            args,
            correlation_id,
        } = invocation;

        for (index, step) in spec.steps.iter().enumerate() {
            let run = StepRun {
                command_name: spec.name.clone(),
                index,
                command: placeholder::resolve(&step.command, actor.as_ref(), &args),
                step: step.clone(),
                actor: actor.clone(),
                correlation_id,
            };

            let inner = self.inner.clone();
            let task = async move { inner.run_step(run).await };

            if step.delay_secs > 0 {
                self.inner
                    .scheduler
                    .after(Duration::from_secs(step.delay_secs), task)?;
            } else {
                self.inner.scheduler.submit(task)?;
            }
        }

        tracing::debug!(
            command = %spec.name,
            correlation = %correlation_id,
            steps = spec.steps.len(),
            "Command dispatched"
        );
        Ok(spec.steps.len())
    }

    fn check_preconditions(&self, spec: &CommandSpec, invocation: &Invocation) -> Result<()> {
        let access = &self.inner.host.access;
        let actor = invocation.actor.as_ref();

        if let Err(e) = spec.validate() {
            tracing::error!(command = %spec.name, error = %e, "Command rejected");
            access.notify(actor, MSG_MISCONFIGURED);
            return Err(e);
        }

        let Some(actor) = actor else {
            if spec.require_actor_is_user {
                tracing::warn!(command = %spec.name, "Console tried to run a player-only command");
                access.notify(None, MSG_PLAYER_ONLY);
                return Err(BridgeError::ActorRequired(spec.name.clone()));
            }
            // Console holds every permission
            return Ok(());
        };

        if !spec.ignore_permission_check {
            let permission = self.inner.config.permission_for(&spec.name);
            if !access.has_permission(actor, &permission) {
                tracing::info!(
                    command = %spec.name,
                    actor = %actor,
                    permission = %permission,
                    "Permission denied"
                );
                access.notify(Some(actor), MSG_NO_PERMISSION);
                return Err(BridgeError::PermissionDenied {
                    actor: actor.name.clone(),
                    permission,
                });
            }
        }

        Ok(())
    }
}

impl Inner {
    async fn run_step(&self, run: StepRun) {
        if run.step.wait_until_online && !self.wait_for_actor(&run).await {
            return;
        }

        for target in run.step.targets.resolve(&self.config.server_id) {
            if target == self.config.server_id {
                self.execute_local(&run).await;
            } else {
                self.relay(&run, &target).await;
            }
        }
    }

    /// Poll presence until the actor is online; false if the step should stop
    async fn wait_for_actor(&self, run: &StepRun) -> bool {
        let Some(actor) = &run.actor else {
            tracing::warn!(
                command = %run.command_name,
                step = run.index,
                "Step waits for a player but was triggered from console, skipped"
            );
            return false;
        };

        let poll = self.config.presence_poll;
        let presence = &self.host.presence;
        let actor_id = actor.id;
        match poll_until(PollState::new(poll.max_attempts), poll.interval(), move || {
            presence.is_present(actor_id, None)
        })
        .await
        {
            Ok(attempt) => {
                tracing::debug!(
                    command = %run.command_name,
                    step = run.index,
                    actor = %actor,
                    attempt,
                    "Actor online"
                );
                true
            }
            Err(state) => {
                let err = BridgeError::PresenceTimeout {
                    actor: actor.name.clone(),
                    attempts: state.attempts,
                };
                tracing::warn!(
                    command = %run.command_name,
                    step = run.index,
                    correlation = %run.correlation_id,
                    error = %err,
                    "Gave up waiting for actor"
                );
                false
            }
        }
    }

    async fn execute_local(&self, run: &StepRun) {
        let executor = &self.host.executor;
        let result = match run.step.executor {
            ExecutorKind::User => {
                let Some(actor) = &run.actor else {
                    tracing::warn!(
                        command = %run.command_name,
                        step = run.index,
                        "Player step has no actor, skipped"
                    );
                    return;
                };
                executor.run_as_user(actor, &run.command).await
            }
            ExecutorKind::System => executor.run_as_system(&run.command).await,
        };

        match result {
            Ok(()) => tracing::info!(
                command = %run.command_name,
                step = run.index,
                executor = %run.step.executor,
                text = %run.command,
                "Executed locally"
            ),
            Err(e @ BridgeError::ActorUnavailable(_)) => tracing::warn!(
                command = %run.command_name,
                step = run.index,
                error = %e,
                "Actor not on this server, step skipped"
            ),
            Err(e) => tracing::error!(
                command = %run.command_name,
                step = run.index,
                error = %e,
                "Local execution failed"
            ),
        }
    }

    async fn relay(&self, run: &StepRun, target: &str) {
        if run.step.executor == ExecutorKind::User && run.actor.is_none() {
            tracing::warn!(
                command = %run.command_name,
                step = run.index,
                target = %target,
                "Player step has no actor, not relayed"
            );
            return;
        }

        if !run.step.disable_presence_check {
            if let Some(actor) = &run.actor {
                if !self.host.presence.is_present(actor.id, Some(target)).await {
                    tracing::info!(
                        command = %run.command_name,
                        step = run.index,
                        target = %target,
                        actor = %actor,
                        "Actor not on target server, not relayed"
                    );
                    return;
                }
            }
        }

        let message = RelayMessage::new(target, run.step.executor, run.command.clone());
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    command = %run.command_name,
                    step = run.index,
                    target = %target,
                    error = %e,
                    "Failed to encode relay message"
                );
                return;
            }
        };

        let envelope = Envelope {
            destination: Destination::Server(target.to_string()),
            channel: self.config.channel.clone(),
            payload,
            via: run.actor.clone(),
        };
        match self.host.transport.send(envelope).await {
            Ok(()) => tracing::debug!(
                command = %run.command_name,
                step = run.index,
                target = %target,
                correlation = %run.correlation_id,
                "Relayed"
            ),
            Err(e) => tracing::warn!(
                command = %run.command_name,
                step = run.index,
                target = %target,
                error = %e,
                "Relay send failed"
            ),
        }
    }
}

//! Command registry: the live command set and its grammar bindings
//!
//! A reload swaps the whole set under one write lock: pending step tasks
//! from the old set are cancelled and its bindings removed before any new
//! command is bound. Triggers take the read lock for the duration of
//! dispatch, so none can interleave with a swap.

use crate::dispatch::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::host::{CommandGrammar, CommandHandler};
use crate::scripts;
use crate::types::{CommandSpec, Invocation};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Result of a reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Commands now live
    pub registered: Vec<String>,

    /// Commands refused (invalid, duplicate, or refused by the grammar)
    pub rejected: Vec<String>,

    /// Step tasks of the previous set that were cancelled
    pub cancelled: usize,
}

/// Owns the live command set
#[derive(Clone)]
pub struct CommandRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    dispatcher: Dispatcher,
    grammar: Arc<dyn CommandGrammar>,
    live: RwLock<HashMap<String, Arc<CommandSpec>>>,
}

impl CommandRegistry {
    /// Create an empty registry binding commands into `grammar`
    pub fn new(dispatcher: Dispatcher, grammar: Arc<dyn CommandGrammar>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                dispatcher,
                grammar,
                live: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The dispatcher triggers are handed to
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Replace the live set with `specs`
    pub fn reload(&self, specs: Vec<CommandSpec>) -> ReloadReport {
        let mut live = self.inner.live.write().unwrap_or_else(PoisonError::into_inner);

        let mut report = ReloadReport {
            cancelled: self.inner.dispatcher.scheduler().cancel_all(),
            ..ReloadReport::default()
        };
        self.inner.unbind_all(&mut live);

        for spec in specs {
            if let Err(e) = spec.validate() {
                tracing::error!(command = %spec.name, error = %e, "Command not registered");
                report.rejected.push(spec.name);
                continue;
            }
            if live.contains_key(&spec.name) {
                tracing::warn!(command = %spec.name, "Duplicate command name, keeping the first");
                report.rejected.push(spec.name);
                continue;
            }

            let handler = handler_for(Arc::downgrade(&self.inner), spec.name.clone());
            if let Err(e) = self.inner.grammar.register(&spec.name, handler) {
                tracing::error!(command = %spec.name, error = %e, "Host refused command");
                report.rejected.push(spec.name);
                continue;
            }

            tracing::info!(
                command = %spec.name,
                steps = spec.steps.len(),
                console = !spec.require_actor_is_user,
                "Command registered"
            );
            report.registered.push(spec.name.clone());
            live.insert(spec.name.clone(), Arc::new(spec));
        }

        report
    }

    /// Load every enabled script in `dir` and reload with them
    ///
    /// If the directory cannot be read the live set is left untouched.
    pub fn reload_from_dir(&self, dir: &Path) -> Result<ReloadReport> {
        let specs = scripts::load_scripts_from_dir(dir).map_err(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to read scripts directory");
            e
        })?;
        Ok(self.reload(specs))
    }

    /// Cancel pending work and remove every command; returns how many were live
    pub fn unload_all(&self) -> usize {
        let mut live = self.inner.live.write().unwrap_or_else(PoisonError::into_inner);
        self.inner.dispatcher.scheduler().cancel_all();
        let count = live.len();
        self.inner.unbind_all(&mut live);
        count
    }

    /// Dispatch the named live command
    pub fn trigger(&self, name: &str, invocation: Invocation) -> Result<usize> {
        self.inner.trigger(name, invocation)
    }

    /// Live command, if any
    pub fn get(&self, name: &str) -> Option<Arc<CommandSpec>> {
        let live = self.inner.live.read().unwrap_or_else(PoisonError::into_inner);
        live.get(name).cloned()
    }

    /// Names of live commands, sorted
    pub fn names(&self) -> Vec<String> {
        let live = self.inner.live.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = live.keys().cloned().collect();
        names.sort();
        names
    }
}

impl RegistryInner {
    fn trigger(&self, name: &str, invocation: Invocation) -> Result<usize> {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        let spec = live
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownCommand(name.to_string()))?;
        self.dispatcher.dispatch(spec, invocation)
    }

    fn unbind_all(&self, live: &mut HashMap<String, Arc<CommandSpec>>) {
        for name in live.keys() {
            match self.grammar.unregister(name) {
                Ok(()) => tracing::info!(command = %name, "Command unregistered"),
                Err(e) => tracing::warn!(command = %name, error = %e, "Failed to unregister command"),
            }
        }
        live.clear();
    }
}

/// Grammar binding that routes back through the registry
fn handler_for(registry: Weak<RegistryInner>, name: String) -> CommandHandler {
    Arc::new(move |invocation: Invocation| match registry.upgrade() {
        Some(inner) => inner.trigger(&name, invocation),
        None => Err(BridgeError::UnknownCommand(name.clone())),
    })
}

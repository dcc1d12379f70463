//! Stateful, class-like executors.

use crate::errors::CommandError;
use crate::inject::Args;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A stateful unit of work.
///
/// A fresh instance is built for every execution. Commands that declare
/// `done` or `fail` finish only when a continuation is called; the others
/// finish when [`Command::execute`] returns.
#[async_trait]
pub trait Command: Send {
    /// The argument names this command wants injected, in order.
    fn arguments(&self) -> &[&str];

    /// Runs the command.
    async fn execute(&mut self, args: Args) -> Result<(), CommandError>;
}

type Constructor = dyn Fn() -> Box<dyn Command> + Send + Sync;

/// Builds a [`Command`] per execution.
///
/// The declared argument names are read from the first instance and cached,
/// so later builds skip the introspection. Clones share the cache.
#[derive(Clone)]
pub struct CommandSpec {
    name: Arc<str>,
    constructor: Arc<Constructor>,
    args: Arc<OnceLock<Arc<[String]>>>,
}

impl CommandSpec {
    /// Creates a spec from a constructor.
    pub fn new<F, C>(name: impl Into<Arc<str>>, constructor: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Command + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(move || Box::new(constructor()) as Box<dyn Command>),
            args: Arc::new(OnceLock::new()),
        }
    }

    /// Creates a spec for a command built with `Default`.
    #[must_use]
    pub fn of<C>() -> Self
    where
        C: Command + Default + 'static,
    {
        let name = std::any::type_name::<C>().rsplit("::").next().unwrap_or("command");
        Self::new(name, C::default)
    }

    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cached argument names, once a command was built.
    #[must_use]
    pub fn cached_args(&self) -> Option<&[String]> {
        self.args.get().map(|a| &a[..])
    }

    pub(crate) fn instantiate(&self) -> (Box<dyn Command>, Arc<[String]>) {
        let command = (self.constructor)();
        let args = self
            .args
            .get_or_init(|| command.arguments().iter().map(|a| (*a).to_string()).collect())
            .clone();
        (command, args)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("args", &self.cached_args())
            .finish_non_exhaustive()
    }
}

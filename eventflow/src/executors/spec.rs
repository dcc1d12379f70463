//! Executor specifications.
//!
//! A [`Spec`] describes a unit of work. It is a closed enum built
//! explicitly by the caller; the factory turns each variant into an
//! [`Executor`](super::Executor) by an exhaustive match.

use super::command::CommandSpec;
use crate::core::ExecutorKind;
use crate::errors::CommandError;
use crate::inject::{names, Args};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

fn owned_names(args: &[&str]) -> Arc<[String]> {
    args.iter().map(|a| (*a).to_string()).collect()
}

type FunctionBody = dyn Fn(Args) -> Result<(), CommandError> + Send + Sync;

/// A plain function with declared argument names.
///
/// A function that declares `done` or `fail` finishes only when one of
/// those continuations is called.
#[derive(Clone)]
pub struct FunctionSpec {
    name: Arc<str>,
    args: Arc<[String]>,
    body: Arc<FunctionBody>,
}

impl FunctionSpec {
    /// Creates a function spec.
    pub fn new<F>(name: impl Into<Arc<str>>, args: &[&str], body: F) -> Self
    where
        F: Fn(Args) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            args: owned_names(args),
            body: Arc::new(body),
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared argument names.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn shared_args(&self) -> Arc<[String]> {
        self.args.clone()
    }

    pub(crate) fn call(&self, args: Args) -> Result<(), CommandError> {
        (self.body)(args)
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

type PromiseBody = dyn Fn(Args) -> BoxFuture<'static, Result<Value, CommandError>> + Send + Sync;

/// An asynchronous operation that settles with a value or an error.
///
/// The settled value is stored on the event as its promise result, a
/// rejection as its promise error.
#[derive(Clone)]
pub struct PromiseSpec {
    name: Arc<str>,
    args: Arc<[String]>,
    body: Arc<PromiseBody>,
}

impl PromiseSpec {
    /// Creates a promise spec from an async closure.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, args: &[&str], body: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CommandError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            args: owned_names(args),
            body: Arc::new(move |args| body(args).boxed()),
        }
    }

    /// A promise that is already resolved with `value`.
    #[must_use]
    pub fn resolved(name: impl Into<Arc<str>>, value: Value) -> Self {
        Self::new(name, &[], move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// Returns the promise name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared argument names.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn shared_args(&self) -> Arc<[String]> {
        self.args.clone()
    }

    pub(crate) fn call(&self, args: Args) -> BoxFuture<'static, Result<Value, CommandError>> {
        (self.body)(args)
    }
}

impl fmt::Debug for PromiseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseSpec")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

type PredicateBody = dyn Fn(&Args) -> Result<bool, CommandError> + Send + Sync;

/// The test a [`ConditionalSpec`] branches on.
#[derive(Clone)]
pub struct Predicate {
    name: Arc<str>,
    args: Arc<[String]>,
    body: Arc<PredicateBody>,
}

impl Predicate {
    /// Creates a predicate whose arguments are resolved like a function's.
    pub fn new<F>(name: impl Into<Arc<str>>, args: &[&str], body: F) -> Self
    where
        F: Fn(&Args) -> Result<bool, CommandError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            args: owned_names(args),
            body: Arc::new(body),
        }
    }

    /// A predicate that always answers `value`.
    #[must_use]
    pub fn constant(value: bool) -> Self {
        Self::new(value.to_string(), &[], move |_| Ok(value))
    }

    /// A predicate testing the truthiness of one value.
    ///
    /// The key is looked up in the event's value bag, then in the
    /// controller's injections. A missing key is falsy rather than an
    /// unresolved argument. `null`, `false`, `0` and `""` are falsy; every
    /// array and object is truthy.
    #[must_use]
    pub fn truthy(key: &str) -> Self {
        let owned = key.to_string();
        Self::new(format!("truthy({key})"), &[names::EVENT, names::THREAD], move |args| {
            let value = args.event().and_then(|event| event.values().get(&owned)).or_else(|| {
                args.thread()
                    .and_then(|thread| thread.controller())
                    .and_then(|controller| controller.injections().get(&owned))
            });
            Ok(value.as_ref().is_some_and(is_truthy))
        })
    }

    /// Returns the predicate name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared argument names.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn shared_args(&self) -> Arc<[String]> {
        self.args.clone()
    }

    pub(crate) fn evaluate(&self, args: &Args) -> Result<bool, CommandError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Runs one of two nested specs depending on a predicate.
///
/// An omitted branch completes immediately.
#[derive(Debug, Clone)]
pub struct ConditionalSpec {
    predicate: Predicate,
    then: Option<Box<Spec>>,
    otherwise: Option<Box<Spec>>,
}

impl ConditionalSpec {
    /// Creates a conditional with both branches omitted.
    #[must_use]
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            then: None,
            otherwise: None,
        }
    }

    /// Sets the branch taken when the predicate holds.
    #[must_use]
    pub fn then(mut self, spec: impl Into<Spec>) -> Self {
        self.then = Some(Box::new(spec.into()));
        self
    }

    /// Sets the branch taken when the predicate does not hold.
    #[must_use]
    pub fn otherwise(mut self, spec: impl Into<Spec>) -> Self {
        self.otherwise = Some(Box::new(spec.into()));
        self
    }

    /// Returns the predicate.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Returns the branch for `choice`.
    #[must_use]
    pub fn branch(&self, choice: bool) -> Option<&Spec> {
        if choice {
            self.then.as_deref()
        } else {
            self.otherwise.as_deref()
        }
    }
}

/// Dispatches a sub-event and waits for it to settle.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSpec {
    event_type: String,
    values: Map<String, Value>,
    target: Option<String>,
    require_catch: bool,
}

impl EventSpec {
    /// Creates a spec for `event_type`.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            values: Map::new(),
            target: None,
            require_catch: false,
        }
    }

    /// Presets a value on the sub-event.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Sets the sub-event's dispatch target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Warns when no controller catches the sub-event.
    #[must_use]
    pub fn require_catch(mut self) -> Self {
        self.require_catch = true;
        self
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the preset values.
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Returns the dispatch target.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns true if the sub-event must be caught.
    #[must_use]
    pub fn requires_catch(&self) -> bool {
        self.require_catch
    }
}

/// A unit of work a thread can run.
#[derive(Debug, Clone)]
pub enum Spec {
    /// A plain function.
    Function(FunctionSpec),
    /// An asynchronous value.
    Promise(PromiseSpec),
    /// A stateful command built per execution.
    Command(CommandSpec),
    /// A branch on a predicate.
    Conditional(ConditionalSpec),
    /// Nested specs run concurrently.
    Parallel(Vec<Spec>),
    /// A sub-event.
    Event(EventSpec),
}

impl Spec {
    /// A sub-event spec.
    #[must_use]
    pub fn event(event_type: impl Into<String>) -> Self {
        Self::Event(EventSpec::new(event_type))
    }

    /// A parallel group.
    #[must_use]
    pub fn parallel<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Spec>,
    {
        Self::Parallel(specs.into_iter().map(Into::into).collect())
    }

    /// A conditional with optional branches.
    #[must_use]
    pub fn conditional(predicate: Predicate, then: Option<Spec>, otherwise: Option<Spec>) -> Self {
        Self::Conditional(ConditionalSpec {
            predicate,
            then: then.map(Box::new),
            otherwise: otherwise.map(Box::new),
        })
    }

    /// Returns the executor kind this spec builds.
    #[must_use]
    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Function(_) => ExecutorKind::Function,
            Self::Promise(_) => ExecutorKind::Promise,
            Self::Command(_) => ExecutorKind::Command,
            Self::Conditional(_) => ExecutorKind::Conditional,
            Self::Parallel(_) => ExecutorKind::Parallel,
            Self::Event(_) => ExecutorKind::Event,
        }
    }

    /// Returns a short label for logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Function(f) => f.name().to_string(),
            Self::Promise(p) => p.name().to_string(),
            Self::Command(c) => c.name().to_string(),
            Self::Conditional(c) => format!("if {}", c.predicate().name()),
            Self::Parallel(specs) => format!("parallel[{}]", specs.len()),
            Self::Event(e) => format!("event {}", e.event_type()),
        }
    }
}

impl From<FunctionSpec> for Spec {
    fn from(spec: FunctionSpec) -> Self {
        Self::Function(spec)
    }
}

impl From<PromiseSpec> for Spec {
    fn from(spec: PromiseSpec) -> Self {
        Self::Promise(spec)
    }
}

impl From<CommandSpec> for Spec {
    fn from(spec: CommandSpec) -> Self {
        Self::Command(spec)
    }
}

impl From<ConditionalSpec> for Spec {
    fn from(spec: ConditionalSpec) -> Self {
        Self::Conditional(spec)
    }
}

impl From<EventSpec> for Spec {
    fn from(spec: EventSpec) -> Self {
        Self::Event(spec)
    }
}

impl From<Vec<Spec>> for Spec {
    fn from(specs: Vec<Spec>) -> Self {
        Self::Parallel(specs)
    }
}

impl From<&str> for Spec {
    fn from(event_type: &str) -> Self {
        Self::event(event_type)
    }
}

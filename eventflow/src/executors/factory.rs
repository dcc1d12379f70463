//! Turns specs into executors.

use super::executor::{Body, Executor};
use super::spec::Spec;
use crate::thread::Thread;
use parking_lot::Mutex;
use std::sync::Arc;

/// Builds [`Executor`]s from [`Spec`]s.
///
/// Stateless; the only cache involved is the argument list a
/// [`CommandSpec`](super::CommandSpec) keeps after its first build.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorFactory;

impl ExecutorFactory {
    /// Builds the executor for `spec`, owned by `thread`.
    ///
    /// Parallel members are built eagerly. Conditional branches are built
    /// only when chosen.
    #[must_use]
    pub fn build(spec: &Spec, thread: &Arc<Thread>) -> Arc<Executor> {
        let id = thread.context().map_or(0, |ctx| ctx.next_id());
        let body = match spec {
            Spec::Function(f) => Body::Function(f.clone()),
            Spec::Promise(p) => Body::Promise(p.clone()),
            Spec::Command(c) => {
                let (command, args) = c.instantiate();
                Body::Command {
                    command: Mutex::new(Some(command)),
                    args,
                }
            }
            Spec::Conditional(c) => Body::Conditional(c.clone()),
            Spec::Parallel(members) => Body::Parallel(members.iter().map(|m| Self::build(m, thread)).collect()),
            Spec::Event(e) => Body::Event(e.clone()),
        };
        Arc::new(Executor::new(id, spec.kind(), spec.label(), thread, body))
    }

    /// Builds one executor per spec, in order.
    #[must_use]
    pub fn build_all(specs: &[Spec], thread: &Arc<Thread>) -> Vec<Arc<Executor>> {
        specs.iter().map(|s| Self::build(s, thread)).collect()
    }
}

//! The controller collaborator.
//!
//! Controllers are the parties that respond to an event by running a thread.
//! How they register interest lives in the bus; the core only needs their
//! identity and their injections.

use crate::context::ValueBag;
use crate::core::ControllerId;

/// A party that handles events.
///
/// Injections act as a controller-scoped default environment for argument
/// resolution. A key of the same name in the event's value bag overrides
/// them for that dispatch.
#[derive(Debug)]
pub struct Controller {
    id: ControllerId,
    name: String,
    injections: ValueBag,
}

impl Controller {
    /// Creates a new controller.
    #[must_use]
    pub fn new(id: ControllerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            injections: ValueBag::new(),
        }
    }

    /// Adds an injection.
    #[must_use]
    pub fn with_injection(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.injections.set(key, value);
        self
    }

    /// Returns the id.
    #[must_use]
    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the injections.
    #[must_use]
    pub fn injections(&self) -> &ValueBag {
        &self.injections
    }
}

impl PartialEq for Controller {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Controller {}

// Ordered guard evaluation with short-circuit on first denial
//
// Later guards may assume earlier ones passed (identity presence, for
// example), so evaluation is strictly sequential and never reordered.

use std::sync::Arc;
use std::time::Instant;

use crate::guard::error::GuardError;
use crate::guard::traits::Guard;
use crate::policy::RoutePolicy;
use crate::request::RequestDescriptor;

#[derive(Clone, Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new() -> Self {
        Self { guards: Vec::new() }
    }

    /// Append a guard (builder style)
    pub fn with(mut self, guard: Arc<dyn Guard>) -> Self {
        self.push(guard);
        self
    }

    pub fn push(&mut self, guard: Arc<dyn Guard>) {
        tracing::trace!("Registered guard '{}' at position {}", guard.name(), self.guards.len());
        self.guards.push(guard);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Run every guard in declaration order, stopping at the first denial
    pub fn evaluate(&self, request: &RequestDescriptor, policy: &RoutePolicy) -> Result<(), GuardError> {
        let start = Instant::now();

        for guard in &self.guards {
            match guard.check(request, policy) {
                Ok(()) => {
                    tracing::debug!("Guard: {} allowed {} {}", guard.name(), request.method, request.path);
                }
                Err(error) => {
                    tracing::warn!(
                        "Guard: {} denied {} {}: {}",
                        guard.name(),
                        request.method,
                        request.path,
                        error
                    );
                    return Err(error);
                }
            }
        }

        tracing::trace!("Guard chain of {} passed in {:?}", self.guards.len(), start.elapsed());
        Ok(())
    }
}

impl std::fmt::Debug for GuardChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardChain").field("guards", &self.names()).finish()
    }
}

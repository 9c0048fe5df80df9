//! Resolver chaining several others.

use super::{DataSourceResolver, ResolveError, Resolved, is_cid_url, missing};
use std::sync::Arc;

/// Tries each resolver in order and returns the first hit.
///
/// Children are always asked leniently. A miss, or a location a child
/// cannot address, falls through to the next one; the composite's own
/// policy decides what a miss everywhere means. Read failures stop the
/// chain.
#[derive(Debug, Clone)]
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn DataSourceResolver>>,
    lenient: bool,
}

impl CompositeResolver {
    /// Creates a strict composite.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn DataSourceResolver>>) -> Self {
        Self {
            resolvers,
            lenient: false,
        }
    }

    /// Sets the lenient policy.
    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Returns the child resolvers.
    #[must_use]
    pub fn resolvers(&self) -> &[Arc<dyn DataSourceResolver>] {
        &self.resolvers
    }
}

impl DataSourceResolver for CompositeResolver {
    fn resolve_with(&self, location: &str, lenient: bool) -> Resolved {
        if is_cid_url(location) {
            return Ok(None);
        }
        for resolver in &self.resolvers {
            match resolver.resolve_with(location, true) {
                Ok(Some(source)) => return Ok(Some(source)),
                Ok(None) => {}
                Err(e @ (ResolveError::NotFound { .. } | ResolveError::InvalidLocation { .. })) => {
                    tracing::trace!(location, error = %e, "Resolver missed, trying the next one");
                }
                Err(e) => return Err(e),
            }
        }
        missing(location, lenient, None)
    }

    fn is_lenient(&self) -> bool {
        self.lenient
    }
}

//! Stage model: one named action against one target

use crate::collab::CollaboratorError;
use crate::core::context::RunContext;
use crate::core::matcher::IdempotencyMatcher;
use crate::core::target::Target;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Pure predicate deciding whether a stage applies to a target
pub type Applicability = fn(&Target) -> bool;

/// The collaborator call a stage performs.
///
/// `Ok` carries a short human-readable summary; `Err` its diagnostic.
#[async_trait]
pub trait StageAction: Send + Sync {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError>;
}

/// A named stage
#[derive(Clone)]
pub struct Stage {
    name: String,
    applies_to: Applicability,
    matcher: IdempotencyMatcher,
    action: Arc<dyn StageAction>,
}

impl Stage {
    /// Stage that applies to every target and treats every failure as fatal
    pub fn new(name: impl Into<String>, action: impl StageAction + 'static) -> Self {
        Self {
            name: name.into(),
            applies_to: applicability::any,
            matcher: IdempotencyMatcher::none(),
            action: Arc::new(action),
        }
    }

    pub fn applies_when(mut self, applies_to: Applicability) -> Self {
        self.applies_to = applies_to;
        self
    }

    pub fn idempotent_on(mut self, matcher: IdempotencyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applies_to(&self, target: &Target) -> bool {
        (self.applies_to)(target)
    }

    pub fn matcher(&self) -> &IdempotencyMatcher {
        &self.matcher
    }

    pub fn action(&self) -> &dyn StageAction {
        self.action.as_ref()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("matcher", &self.matcher.name())
            .finish_non_exhaustive()
    }
}

/// Applicability predicates shared by the stage catalog
pub mod applicability {
    use crate::core::target::Target;

    pub fn any(_: &Target) -> bool {
        true
    }

    pub fn hub(target: &Target) -> bool {
        target.is_hub()
    }

    pub fn spoke(target: &Target) -> bool {
        target.is_spoke()
    }

    /// Platforms whose machines the pipeline provisions itself
    pub fn infra_managed(target: &Target) -> bool {
        target.requires_infra_lifecycle()
    }

    /// Spokes whose gateways are discovered through the cloud inventory
    pub fn infra_managed_spoke(target: &Target) -> bool {
        target.is_spoke() && target.requires_infra_lifecycle()
    }
}

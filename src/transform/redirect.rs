//! Call-site redirection.

use std::collections::BTreeSet;

use crate::{
    classfile::ClassFile,
    matcher::TargetMatcher,
    pipeline::Entry,
    rewriter::{inject_redirects, DispatchTarget, ModuleRewriter},
    runtime::SignatureKey,
    transform::{Transform, TransformOutcome},
    Result,
};

/// Which calls to redirect and where to send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    /// The static dispatch method rewritten call sites invoke
    pub dispatcher: DispatchTarget,
    /// Signature keys of the calls to redirect
    pub targets: BTreeSet<SignatureKey>,
}

impl RedirectConfig {
    /// A configuration without targets.
    #[must_use]
    pub fn new(dispatcher: DispatchTarget) -> Self {
        RedirectConfig {
            dispatcher,
            targets: BTreeSet::new(),
        }
    }

    /// Add a call to redirect.
    #[must_use]
    pub fn target(mut self, key: impl Into<SignatureKey>) -> Self {
        self.targets.insert(key.into());
        self
    }

    /// Add several calls to redirect.
    #[must_use]
    pub fn targets<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<SignatureKey>,
    {
        self.targets.extend(keys.into_iter().map(Into::into));
        self
    }
}

/// Transformer rewriting target call sites into dispatcher calls.
pub struct CallRedirectionInjector {
    name: String,
    matcher: TargetMatcher,
    config: RedirectConfig,
}

impl CallRedirectionInjector {
    /// Redirect the configured calls in entries selected by `matcher`.
    pub fn new(name: impl Into<String>, matcher: TargetMatcher, config: RedirectConfig) -> Self {
        CallRedirectionInjector {
            name: name.into(),
            matcher,
            config,
        }
    }

    /// The redirection configuration.
    #[must_use]
    pub fn config(&self) -> &RedirectConfig {
        &self.config
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        // The dispatcher must keep calling the real methods
        if class.name()? == self.config.dispatcher.owner {
            return Ok(());
        }
        inject_redirects(class, &self.config.targets, &self.config.dispatcher)?;
        Ok(())
    }
}

impl Transform for CallRedirectionInjector {
    fn name(&self) -> &str {
        &self.name
    }

    fn matcher(&self) -> &TargetMatcher {
        &self.matcher
    }

    fn transform(&self, entry: &Entry) -> TransformOutcome {
        if self.config.targets.is_empty() {
            return TransformOutcome::Unchanged;
        }
        ModuleRewriter::rewrite(&entry.name, &entry.data, |class| self.apply(class)).into()
    }
}

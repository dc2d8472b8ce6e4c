//! The dependency resolution engine.
//!
//! A deterministic, single-threaded depth-first walk over the requested
//! dependency set. Each dependency moves through
//! `Resolving -> Satisfied | Failed` exactly once per run; revisiting a
//! name that is still `Resolving` is a cycle and fails fast. Dependencies
//! are resolved before their dependents, and providers mutate the shared
//! environment as they go — which is exactly why this walk must never be
//! parallelized.
//!
//! The configuration cache is saved after every newly satisfied dependency
//! (so partial progress survives a later failure) and once more after the
//! whole requested set succeeds.

use crate::cache;
use crate::config::EngineConfig;
use crate::depspec::DependencySpec;
use crate::environment::Environment;
use crate::error::{CairnError, Result};
use crate::fetch::Fetcher;
use crate::provider::ProviderRegistry;
use std::collections::HashMap;

/// Per-run resolution state for one dependency name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    Resolving,
    Satisfied,
    Failed,
}

/// Walks the dependency graph, checking and installing each dependency
/// exactly once per run.
pub struct ResolutionEngine {
    config: EngineConfig,
    registry: ProviderRegistry,
    fetcher: Fetcher,
    env: Environment,
    states: HashMap<String, ResolveState>,
    stack: Vec<String>,
}

impl ResolutionEngine {
    /// Create an engine, seeding the environment and search paths from the
    /// configuration cache.
    pub fn new(mut config: EngineConfig, registry: ProviderRegistry) -> Self {
        let (env, cached_paths) = cache::load(&config);
        for path in &cached_paths {
            config.add_search_path(path);
        }
        Self {
            config,
            registry,
            fetcher: Fetcher::new(),
            env,
            states: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// The shared environment as discovered so far.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consume the engine, yielding the final environment.
    pub fn into_environment(self) -> Environment {
        self.env
    }

    /// Resolve every requested dependency, then persist the cache.
    pub fn resolve_all(&mut self, specs: &[DependencySpec]) -> Result<()> {
        for spec in specs {
            self.resolve(spec)?;
        }
        cache::save(&self.config, &self.env, &self.config.search_paths)?;
        Ok(())
    }

    /// Resolve one dependency and everything it depends on.
    pub fn resolve(&mut self, spec: &DependencySpec) -> Result<()> {
        let name = spec.name.to_lowercase();
        match self.states.get(&name) {
            Some(ResolveState::Satisfied) => return Ok(()),
            Some(ResolveState::Failed) => {
                return Err(CairnError::Other(anyhow::anyhow!(
                    "dependency '{name}' already failed in this run"
                )));
            }
            Some(ResolveState::Resolving) => {
                return Err(CairnError::CyclicDependency {
                    chain: self.render_cycle(&name),
                });
            }
            None => {}
        }

        self.states.insert(name.clone(), ResolveState::Resolving);
        self.stack.push(name.clone());
        let result = self.resolve_inner(spec, &name);
        self.stack.pop();

        match result {
            Ok(()) => {
                self.states.insert(name, ResolveState::Satisfied);
                Ok(())
            }
            Err(err) => {
                tracing::error!(dependency = %name, %err, "resolution failed");
                self.states.insert(name, ResolveState::Failed);
                Err(err)
            }
        }
    }

    fn resolve_inner(&mut self, spec: &DependencySpec, name: &str) -> Result<()> {
        let provider = self.registry.resolve(name, &self.fetcher, &self.config)?;

        // Dependencies first: the requirement's own declarations, then the
        // provider's, in declaration order without duplicates.
        let mut dependencies = spec.dependencies.clone();
        for dep in provider.dependencies(&self.config) {
            if !dependencies.iter().any(|d| d.name == dep.name) {
                dependencies.push(dep);
            }
        }
        for dep in &dependencies {
            self.resolve(dep)?;
        }

        provider.declare_defaults(&mut self.env);

        let version = spec.requested_version.as_deref();
        tracing::info!(dependency = %name, version, "checking");
        if provider.check_installed(&mut self.env, &self.config, version, spec.strict)? {
            self.mark_satisfied(name)?;
            return Ok(());
        }

        if !self.config.install {
            return Err(CairnError::NotFound {
                name: name.to_string(),
            });
        }

        provider.download(&mut self.env, &self.fetcher, &self.config, version)?;
        let outcome =
            provider.install(&mut self.env, &self.fetcher, &self.config, version, spec.strict)?;
        self.env.merge(&outcome.env_delta);
        for path in &outcome.added_search_paths {
            self.config.add_search_path(path);
        }

        // Trust but verify: a provider that installs but cannot then be
        // detected is itself a failure.
        if !provider.check_installed(&mut self.env, &self.config, version, spec.strict)? {
            return Err(CairnError::VerificationFailed {
                dependency: name.to_string(),
            });
        }
        self.mark_satisfied(name)?;
        Ok(())
    }

    fn mark_satisfied(&mut self, name: &str) -> Result<()> {
        tracing::info!(dependency = %name, "satisfied");
        self.env.push_onto("PREREQUISITES", name);
        // Intermediate save: a later failure must not cost finished work.
        cache::save(&self.config, &self.env, &self.config.search_paths)
    }

    fn render_cycle(&self, name: &str) -> String {
        let start = self
            .stack
            .iter()
            .position(|n| n == name)
            .unwrap_or(0);
        let mut chain: Vec<&str> = self.stack[start..].iter().map(|s| s.as_str()).collect();
        chain.push(name);
        chain.join(" -> ")
    }
}

//! Dependency providers and their resolution.
//!
//! A provider is the pluggable unit of knowledge for one dependency: how to
//! detect it, fetch it, and install it. Providers are resolved by name
//! through an explicit ordered fallback chain (first match wins):
//!
//! 1. Override directory (`<override_dir>/<name>.yml`; falls back to
//!    `~/.cairn/providers` when none is configured)
//! 2. Registered providers (built-ins plus explicit registrations)
//! 3. A synthesized language-package-index provider, when the name is
//!    confirmed to exist in the configured index
//!
//! Unresolvable names fail with [`CairnError::NoProvider`].

pub mod builtin;
pub mod declared;
pub mod index;
pub mod overrides;

pub use declared::{DeclaredProvider, PackageNames, ProviderKind, ProviderSpec, SourceRecipe};

use crate::config::EngineConfig;
use crate::depspec::DependencySpec;
use crate::environment::Environment;
use crate::error::{CairnError, Result};
use crate::fetch::Fetcher;
use crate::install::InstallOutcome;
use std::path::PathBuf;
use std::sync::Arc;

/// The per-dependency provider contract.
///
/// Providers are stateless across calls: all discovered facts flow into the
/// shared [`Environment`], and per-run bookkeeping (visited/satisfied) is
/// the resolution engine's memo table.
pub trait Provider: Send + Sync {
    /// Case-normalized dependency name this provider serves.
    fn name(&self) -> &str;

    /// Dependencies this provider itself requires, resolved before it.
    fn dependencies(&self, config: &EngineConfig) -> Vec<DependencySpec> {
        let _ = config;
        Vec::new()
    }

    /// Seed the environment with placeholders for every key this provider
    /// may write, so downstream consumers never see undefined keys. Must
    /// never clobber values already present.
    fn declare_defaults(&self, env: &mut Environment);

    /// Probe for an existing installation, writing discovered paths and
    /// flags into the environment on success.
    fn check_installed(
        &self,
        env: &mut Environment,
        config: &EngineConfig,
        version: Option<&str>,
        strict: bool,
    ) -> Result<bool>;

    /// Fetch whatever the install step needs, returning the local source
    /// directory. Providers with nothing to fetch return the build
    /// directory unchanged.
    fn download(
        &self,
        env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version: Option<&str>,
    ) -> Result<PathBuf>;

    /// Install the dependency. Verification is the engine's job: it re-runs
    /// `check_installed` after a successful install.
    fn install(
        &self,
        env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version: Option<&str>,
        strict: bool,
    ) -> Result<InstallOutcome>;
}

/// Ordered provider registry.
pub struct ProviderRegistry {
    registered: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// A registry pre-populated with the built-in provider set.
    pub fn new() -> Self {
        Self {
            registered: builtin::providers(),
        }
    }

    /// A registry with no built-ins (tests, embedders).
    pub fn empty() -> Self {
        Self {
            registered: Vec::new(),
        }
    }

    /// Register a provider. Later registrations shadow earlier ones of the
    /// same name.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.registered.insert(0, provider);
    }

    /// Names of every registered provider, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registered.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Resolve a provider for a dependency name through the fallback chain.
    pub fn resolve(
        &self,
        name: &str,
        fetcher: &Fetcher,
        config: &EngineConfig,
    ) -> Result<Arc<dyn Provider>> {
        let name = name.to_lowercase();

        let override_dir = config.override_dir.clone().or_else(user_override_dir);
        if let Some(dir) = override_dir {
            if let Some(provider) = overrides::load(&dir, &name)? {
                tracing::debug!(%name, dir = %dir.display(), "using override provider");
                return Ok(provider);
            }
        }

        if let Some(provider) = self.registered.iter().find(|p| p.name() == name) {
            return Ok(provider.clone());
        }

        if index::exists_in_index(&name, fetcher, config) {
            tracing::debug!(%name, "synthesizing package-index provider");
            return Ok(Arc::new(index::PackageIndexProvider::new(&name)));
        }

        Err(CairnError::NoProvider { name })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The user-level override directory, consulted when no project-level one
/// is configured.
fn user_override_dir() -> Option<std::path::PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".cairn").join("providers"))
        .filter(|dir| dir.is_dir())
}

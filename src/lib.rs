//! cairn - prerequisite resolution and installation orchestrator.
//!
//! Given a declared set of third-party dependencies (compilers, libraries,
//! language packages, downloadable assets), cairn determines what is
//! already present, fetches and builds what is missing, and records the
//! discovered configuration (paths, flags, library names) for reuse by
//! later build steps.
//!
//! # Modules
//!
//! - [`archive`] - Fetch-and-extract with canonical directory naming
//! - [`cache`] - Persisted configuration cache
//! - [`cli`] - Command-line interface
//! - [`config`] - Per-run engine configuration
//! - [`depspec`] - Dependency specifications and requirement parsing
//! - [`engine`] - The dependency resolution state machine
//! - [`environment`] - The shared configuration environment
//! - [`error`] - Error types and result aliases
//! - [`exec`] - Logged subprocess execution
//! - [`fetch`] - Download cache
//! - [`install`] - Install strategy selection and execution
//! - [`locate`] - Filesystem search heuristics
//! - [`platform`] - OS detection and filename tables
//! - [`provider`] - Provider contract, registry, and implementations
//! - [`subpackage`] - Nested build-unit orchestration
//! - [`ui`] - Terminal output and progress
//! - [`version`] - Loose version parsing and comparison
//!
//! # Example
//!
//! ```no_run
//! use cairn::config::EngineConfig;
//! use cairn::depspec::DependencySpec;
//! use cairn::engine::ResolutionEngine;
//! use cairn::provider::ProviderRegistry;
//!
//! let config = EngineConfig::new("build");
//! let mut engine = ResolutionEngine::new(config, ProviderRegistry::new());
//! let spec = DependencySpec::parse("zlib>=1.2").unwrap();
//! engine.resolve_all(&[spec]).unwrap();
//! let env = engine.environment();
//! assert!(env.is_set("ZLIB_LIB_DIR"));
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod depspec;
pub mod engine;
pub mod environment;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod install;
pub mod locate;
pub mod platform;
pub mod provider;
pub mod subpackage;
pub mod ui;
pub mod version;

pub use error::{CairnError, Result};

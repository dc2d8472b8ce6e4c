//! Recursive build support for nested build units.
//!
//! A project may contain subpackages that each carry their own build
//! configuration; the orchestrator re-invokes a named command in every
//! unit's directory. Sequential mode preserves order and stops at the
//! first failure. Parallel mode trades fail-fast for wall-clock time: a
//! bounded worker pool attempts every unit, each worker owning its own
//! subprocess and log file, and all failures are reported together at the
//! end. Workers share nothing but the results channel.

use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use crate::exec::{self, ExecOptions};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// One nested build unit.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    pub name: String,
    pub directory: PathBuf,
}

impl BuildUnit {
    pub fn new(name: &str, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            directory: directory.into(),
        }
    }
}

/// How units are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Declaration order, stop on first failure.
    Sequential,
    /// Bounded worker pool; every unit is attempted.
    Parallel { workers: usize },
}

/// Outcome of one unit's invocation.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub name: String,
    pub success: bool,
    pub log: PathBuf,
}

/// Re-invokes a command across build units.
pub struct Orchestrator {
    program: String,
    /// Argument vector passed through to every sub-invocation, already
    /// filtered to the flags relevant there.
    pass_args: Vec<String>,
    build_dir: PathBuf,
}

impl Orchestrator {
    /// Orchestrator re-invoking this executable.
    pub fn new(config: &EngineConfig, pass_args: Vec<String>) -> Self {
        let program = std::env::current_exe()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "cairn".to_string());
        Self {
            program,
            pass_args,
            build_dir: config.build_dir.clone(),
        }
    }

    /// Orchestrator for an arbitrary program (tests, foreign build tools).
    pub fn with_program(program: &str, pass_args: Vec<String>, config: &EngineConfig) -> Self {
        Self {
            program: program.to_string(),
            pass_args,
            build_dir: config.build_dir.clone(),
        }
    }

    /// Run `command` in every unit.
    pub fn run(&self, units: &[BuildUnit], command: &str, mode: Mode) -> Result<Vec<UnitResult>> {
        match mode {
            Mode::Sequential => self.run_sequential(units, command),
            Mode::Parallel { workers } => self.run_parallel(units, command, workers),
        }
    }

    fn unit_log(&self, unit: &BuildUnit, command: &str) -> PathBuf {
        self.build_dir.join(format!("{}_{}.log", unit.name, command))
    }

    fn run_unit(&self, unit: &BuildUnit, command: &str) -> Result<UnitResult> {
        let log = self.unit_log(unit, command);
        let mut args = vec![command.to_string()];
        args.extend(self.pass_args.iter().cloned());
        let options = ExecOptions::in_dir(&unit.directory).with_log(&log);

        tracing::info!(unit = %unit.name, command, "running subpackage command");
        let success = match exec::run_logged(&self.program, &args, &options) {
            Ok(result) => result.success,
            Err(CairnError::Command { .. }) => false,
            Err(other) => return Err(other),
        };
        Ok(UnitResult {
            name: unit.name.clone(),
            success,
            log,
        })
    }

    fn run_sequential(&self, units: &[BuildUnit], command: &str) -> Result<Vec<UnitResult>> {
        let mut results = Vec::with_capacity(units.len());
        for unit in units {
            let result = self.run_unit(unit, command)?;
            if !result.success {
                return Err(CairnError::Install {
                    dependency: unit.name.clone(),
                    log: result.log,
                });
            }
            results.push(result);
        }
        Ok(results)
    }

    fn run_parallel(
        &self,
        units: &[BuildUnit],
        command: &str,
        workers: usize,
    ) -> Result<Vec<UnitResult>> {
        let workers = workers.max(1).min(units.len().max(1));
        let queue: Arc<Mutex<VecDeque<(usize, BuildUnit)>>> =
            Arc::new(Mutex::new(units.iter().cloned().enumerate().collect()));
        let (tx, rx) = mpsc::channel::<(usize, Result<UnitResult>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                scope.spawn(move || loop {
                    let next = queue.lock().expect("queue lock").pop_front();
                    let Some((index, unit)) = next else {
                        break;
                    };
                    let result = self.run_unit(&unit, command);
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<Result<UnitResult>>> =
            (0..units.len()).map(|_| None).collect();
        for (index, result) in rx {
            slots[index] = Some(result);
        }

        let mut results = Vec::with_capacity(units.len());
        for slot in slots {
            match slot {
                Some(Ok(result)) => results.push(result),
                Some(Err(err)) => return Err(err),
                None => unreachable!("every unit reports exactly once"),
            }
        }

        let failures: Vec<&UnitResult> = results.iter().filter(|r| !r.success).collect();
        if failures.is_empty() {
            return Ok(results);
        }
        let summary = failures
            .iter()
            .map(|f| format!("{} (see {})", f.name, f.log.display()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(CairnError::Other(anyhow::anyhow!(
            "{} subpackage build(s) failed: {summary}",
            failures.len()
        )))
    }
}

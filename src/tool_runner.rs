//! # External Tool Invoker
//!
//! Esegue i tool esterni (ffmpeg, ffprobe, sips) in modo sincrono e traduce
//! l'esito in righe di log e in `PressError`.
//!
//! ## Responsabilità:
//! - Costruzione degli argomenti (`args!`)
//! - Esecuzione bloccante con cattura di stdout/stderr
//! - `-loglevel error` su ogni invocazione di ffmpeg
//! - Classificazione dei fallimenti: binario mancante vs exit code non zero
//! - Log: riga "✓ Completed" o "🚨 ERROR: <ultima riga stderr>", dettagli a debug
//!
//! ## Seam:
//! `CommandExecutor` isola il processo reale; i test usano un executor finto
//! che registra le invocazioni e crea i file di output richiesti.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::error::PressError;
use crate::processing_log::ProcessingLog;
use crate::tool_resolver::{Tool, ToolPaths};

/// Build a `Vec<String>` argument list from mixed displayable values
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}

/// Captured result of one process execution
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a program to completion
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, program: &Path, args: &[String]) -> std::io::Result<ToolOutput>;
}

/// Executor backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, program: &Path, args: &[String]) -> std::io::Result<ToolOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Log-aware wrapper around a `CommandExecutor`
#[derive(Clone)]
pub struct ToolRunner {
    executor: Arc<dyn CommandExecutor>,
    tools: ToolPaths,
    log: Arc<ProcessingLog>,
}

impl ToolRunner {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        tools: ToolPaths,
        log: Arc<ProcessingLog>,
    ) -> Self {
        Self { executor, tools, log }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Run `tool` with `args`, returning its stdout on success.
    ///
    /// `prefix` starts every operator-visible line for this invocation.
    pub fn run(&self, tool: Tool, args: Vec<String>, prefix: &str) -> Result<String, PressError> {
        let program = self
            .tools
            .path(tool)
            .ok_or_else(|| PressError::ToolNotFound(tool.name().to_string()))?;

        let mut full_args = Vec::with_capacity(args.len() + 2);
        if tool == Tool::Ffmpeg {
            full_args.extend(args!["-loglevel", "error"]);
        }
        full_args.extend(args);

        let command_line = format!("{} {}", program.display(), full_args.join(" "));

        let output = match self.executor.execute(program, &full_args) {
            Ok(output) => output,
            Err(e) => {
                self.log.info(format!("🚨 CRITICAL ERROR: Not found `{}`.", program.display()));
                self.log.debug(format!(
                    "[DEBUG_ERROR] Command: {}\nSpawn error: {}",
                    command_line, e
                ));
                return Err(PressError::ToolNotFound(program.display().to_string()));
            }
        };

        if !output.success {
            let last_line = last_diagnostic_line(&output.stderr);
            self.log.info(format!("{} 🚨 ERROR: {}", prefix, last_line));
            self.log.debug(format!(
                "[DEBUG_ERROR] Command: {} (exit {:?})\nFull Error:\n{}",
                command_line, output.code, output.stderr
            ));
            return Err(PressError::Tool {
                tool: tool.name().to_string(),
                message: last_line,
            });
        }

        self.log.info(format!("{} ✓ Completed", prefix));
        self.log.debug(format!(
            "[DEBUG] Command: {}\nOutput:\n{}",
            command_line,
            output.stderr.trim()
        ));
        Ok(output.stdout)
    }
}

/// Last non-empty stderr line, the one tools put their verdict on
fn last_diagnostic_line(stderr: &str) -> String {
    stderr
        .trim()
        .lines()
        .last()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Unknown error".to_string())
}

//! Persistent shell session — durable working-directory and environment
//! state across `execute` calls.
//!
//! # Design
//!
//! Each call runs the command through a short-lived `sh -c` process with
//! the session's current `cwd` and `env` as the execution context; there
//! is no long-lived interactive interpreter. Completion is the child's
//! exit status — no sentinel markers injected into the output stream,
//! which can collide with legitimate output and force latency-bound
//! polling.
//!
//! Directory state is re-derived after the fact: when a command exits
//! successfully, a second short probe starts in the session's `cwd`
//! with the session's environment, re-runs the command with its output
//! discarded, and prints the resulting directory. `OLDPWD` must arrive
//! untouched for a re-run `cd -` to land where the first one did.
//! The probe's last output line becomes the new
//! `cwd` iff it is a syntactically absolute path. `env["PWD"]` and
//! `env["OLDPWD"]` are kept consistent with `cwd`/`oldpwd` after every
//! change, so `cd -` and `cd ~` behave like they would in a real shell.
//!
//! # Timeout policy
//!
//! A command that outlives the execution ceiling is killed and `execute`
//! returns a fixed diagnostic string as the output; the caller still
//! sees a successful response carrying that diagnostic. Partial output
//! accumulated before the kill is discarded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;
use tracing::debug;

use crate::error::AgentError;
use crate::protocol::exec::ExecuteResult;

/// Ceiling for the post-command directory probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ── SessionOptions ───────────────────────────────────────────────

/// Tunables for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Execution ceiling per command.
    pub exec_timeout: Duration,

    /// Maximum output lines before truncation.
    pub max_output_lines: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            exec_timeout: Duration::from_secs(30),
            max_output_lines: 50,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// One shell's persistent state: working directory, environment, and
/// previous directory.
///
/// A session belongs to exactly one connection; concurrent connections
/// each hold their own and cannot observe each other's directory
/// changes.
#[derive(Debug)]
pub struct Session {
    cwd: PathBuf,
    oldpwd: PathBuf,
    env: HashMap<String, String>,
    options: SessionOptions,
}

impl Session {
    /// A fresh session rooted in the agent's home directory.
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    /// A fresh session with explicit tunables.
    pub fn with_options(options: SessionOptions) -> Self {
        let cwd = std::env::var_os("HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute() && p.is_dir())
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.insert("PWD".to_string(), cwd.display().to_string());
        env.insert("OLDPWD".to_string(), cwd.display().to_string());

        Self {
            oldpwd: cwd.clone(),
            cwd,
            env,
            options,
        }
    }

    /// The session's current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The session's environment.
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Run a command in the session, capturing combined output and the
    /// resulting directory.
    pub async fn execute(&mut self, command: &str) -> Result<ExecuteResult, AgentError> {
        let child = self.spawn(command)?;

        let output = match time::timeout(self.options.exec_timeout, child.wait_with_output()).await
        {
            Ok(result) => result.map_err(|e| AgentError::Execution(e.to_string()))?,
            Err(_) => {
                // Dropping the wait future kills the child (kill_on_drop).
                let secs = self.options.exec_timeout.as_secs();
                debug!(command, "command exceeded execution ceiling");
                return Ok(ExecuteResult {
                    output: format!("command timed out after {secs}s"),
                    cwd: self.cwd.display().to_string(),
                });
            }
        };

        // stderr appended after stdout; interleaving order is lost.
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let text = truncate_lines(combined.trim_end_matches('\n'), self.options.max_output_lines);

        if output.status.success() {
            self.reconcile_cwd(command).await;
        }

        Ok(ExecuteResult {
            output: text,
            cwd: self.cwd.display().to_string(),
        })
    }

    fn spawn(&self, command: &str) -> Result<tokio::process::Child, AgentError> {
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .env_clear()
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Execution(format!("failed to spawn shell: {e}")))
    }

    /// Re-derive the working directory after a successful command.
    ///
    /// The probe never fails the overall call: on probe error or
    /// timeout the session keeps its previous directory.
    async fn reconcile_cwd(&mut self, command: &str) {
        // The probe shell starts in the session's cwd (current_dir) with
        // the session's PWD/OLDPWD in its environment. No `cd` preamble:
        // any cd would overwrite OLDPWD and break a re-run `cd -`.
        let probe = format!("{{ {command}\n}} >/dev/null 2>&1; pwd");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&probe)
            .current_dir(&self.cwd)
            .env_clear()
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match time::timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            _ => {
                debug!(command, "cwd probe failed or timed out");
                return;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(last) = stdout.lines().rev().find(|l| !l.trim().is_empty()) else {
            return;
        };
        let candidate = last.trim();
        if !candidate.starts_with('/') || Path::new(candidate) == self.cwd {
            return;
        }

        self.oldpwd = std::mem::replace(&mut self.cwd, PathBuf::from(candidate));
        self.env
            .insert("PWD".to_string(), self.cwd.display().to_string());
        self.env
            .insert("OLDPWD".to_string(), self.oldpwd.display().to_string());
        debug!(cwd = %self.cwd.display(), "session directory changed");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ───────────────────────────────────────────────────────

/// Keep the first `max` lines, replacing the rest with an omission
/// marker.
fn truncate_lines(text: &str, max: usize) -> String {
    let total = text.lines().count();
    if total <= max {
        return text.to_string();
    }
    let omitted = total - max;
    let mut out = text
        .lines()
        .take(max)
        .collect::<Vec<_>>()
        .join("\n");
    out.push_str(&format!("\n... [{omitted} lines omitted]"));
    out
}

// ── Tests ─────────────────────────────────────────────────────────

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lotel_core::error::{LotelError, Result};
use lotel_core::paths::Paths;
use lotel_core::signal::SignalKind;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::state::{StateRecord, StateStore};

/// Health-check extension endpoint of the default collector config.
pub const HEALTH_URL: &str = "http://localhost:13133/";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 100 rounds of 100 ms: the 10 s grace window before SIGKILL.
const STOP_POLL_ROUNDS: u32 = 100;

/// Supervises the external collector binary across CLI invocations: spawn
/// detached, track through the persisted state record, probe, terminate.
pub struct Supervisor {
    paths: Paths,
    state: StateStore,
}

#[derive(Debug)]
pub enum StartOutcome {
    Started(StateRecord),
    AlreadyRunning { pid: i32 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: i32, forced: bool },
    NotRunning,
}

#[derive(Debug, Default, Serialize)]
pub struct CollectorStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    pub healthy: bool,
}

impl Supervisor {
    pub fn new(paths: Paths) -> Self {
        let state = StateStore::new(paths.state_file());
        Self { paths, state }
    }

    /// Launches the collector as a detached child, unless a live one is
    /// already recorded. A stale record is cleared and treated as "nothing
    /// was running".
    pub fn start(&self, config_path: &Path, data_path: &Path) -> Result<StartOutcome> {
        if let Some(record) = self.state.read()? {
            if is_collector_alive(record.pid) {
                return Ok(StartOutcome::AlreadyRunning { pid: record.pid });
            }
            debug!(pid = record.pid, "discarding stale supervisor record");
            self.state.remove()?;
        }

        let binary = find_binary()?;

        for signal in SignalKind::ALL {
            let dir = data_path.join(signal.as_str());
            fs::create_dir_all(&dir).map_err(|e| {
                LotelError::Io(format!("creating data directory {}: {e}", dir.display()))
            })?;
        }

        let resolved = self
            .paths
            .materialize_resolved_config(config_path, data_path)?;

        let mut cmd = Command::new(&binary);
        cmd.arg("--config")
            .arg(&resolved)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group: the collector must outlive this CLI exit.
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LotelError::Supervise(format!("starting collector: {e}")))?;

        let record = StateRecord {
            pid: child.id() as i32,
            binary,
            started_at: Utc::now(),
            config_path: resolved,
            data_path: data_path.to_path_buf(),
        };

        if let Err(e) = self.state.write(&record) {
            // An unrecorded child would be unmanageable; take it down.
            let _ = child.kill();
            return Err(LotelError::Supervise(format!("persisting state: {e}")));
        }

        Ok(StartOutcome::Started(record))
    }

    /// Politely terminates the recorded collector, escalating to SIGKILL
    /// when it does not exit within the grace window. The record is cleared
    /// on every path out.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let Some(record) = self.state.read()? else {
            return Ok(StopOutcome::NotRunning);
        };
        if !is_collector_alive(record.pid) {
            self.state.remove()?;
            return Ok(StopOutcome::NotRunning);
        }

        let pid = record.pid;
        if let Err(e) = send_sigterm(pid) {
            self.state.remove()?;
            return Err(e);
        }

        // Background poller watches for exit; the one-slot channel carries
        // whether it happened inside the grace window.
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            for _ in 0..STOP_POLL_ROUNDS {
                if !process_exists(pid) {
                    let _ = tx.send(true);
                    return;
                }
                tokio::time::sleep(STOP_POLL_INTERVAL).await;
            }
            let _ = tx.send(false);
        });

        let exited = rx.await.unwrap_or(false);
        let forced = !exited;
        if forced {
            warn!(pid, "graceful shutdown timed out, sending SIGKILL");
            let _ = send_sigkill(pid);
        }

        self.state.remove()?;
        Ok(StopOutcome::Stopped { pid, forced })
    }

    /// Reconciles the record against reality: a present-but-dead record is
    /// cleared as a side effect, and `healthy` always comes from a fresh
    /// probe.
    pub async fn status(&self) -> Result<CollectorStatus> {
        let Some(record) = self.state.read()? else {
            return Ok(CollectorStatus::default());
        };
        if !is_collector_alive(record.pid) {
            debug!(pid = record.pid, "clearing stale supervisor record");
            self.state.remove()?;
            return Ok(CollectorStatus::default());
        }

        let uptime = (Utc::now() - record.started_at).to_std().unwrap_or_default();
        let uptime = Duration::from_secs(uptime.as_secs());

        Ok(CollectorStatus {
            running: true,
            pid: Some(record.pid),
            binary: Some(record.binary.clone()),
            started_at: Some(record.started_at),
            uptime: Some(humantime::format_duration(uptime).to_string()),
            healthy: check_health().await,
        })
    }
}

/// Probes the fixed health endpoint; any transport error or non-2xx status
/// reads as unhealthy. Bounded by the 2 s client timeout, never fatal.
pub async fn check_health() -> bool {
    probe(HEALTH_URL).await
}

/// Polls the health endpoint every 500 ms until it answers 2xx or the
/// timeout elapses.
pub async fn wait_healthy(timeout: Duration) -> Result<()> {
    wait_for(HEALTH_URL, timeout).await
}

async fn probe(url: &str) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() else {
        return false;
    };
    match client.get(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

async fn wait_for(url: &str, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if probe(url).await {
            return Ok(());
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
    Err(LotelError::Supervise(format!(
        "collector did not become healthy within {}",
        humantime::format_duration(timeout)
    )))
}

/// Searches PATH for `otelcol-contrib`, then `otelcol`.
pub fn find_binary() -> Result<PathBuf> {
    find_binary_in(&env::var_os("PATH").unwrap_or_default())
}

fn find_binary_in(path_var: &OsString) -> Result<PathBuf> {
    for name in ["otelcol-contrib", "otelcol"] {
        for dir in env::split_paths(path_var) {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }
    Err(LotelError::NotInstalled)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Zero-signal probe: checks existence without delivering anything. EPERM
/// still means the process exists.
#[cfg(unix)]
pub fn process_exists(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn process_exists(_pid: i32) -> bool {
    false
}

/// A recorded pid counts as the collector only while the process exists
/// and, where the kernel exposes it, its command line names `otelcol`. The
/// substring check defends against pid reuse by unrelated processes.
fn is_collector_alive(pid: i32) -> bool {
    if pid <= 0 || !process_exists(pid) {
        return false;
    }
    cmdline_names_collector(pid)
}

#[cfg(target_os = "linux")]
fn cmdline_names_collector(pid: i32) -> bool {
    match fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(raw) => String::from_utf8_lossy(&raw).contains("otelcol"),
        Err(_) => true,
    }
}

#[cfg(not(target_os = "linux"))]
fn cmdline_names_collector(_pid: i32) -> bool {
    true
}

#[cfg(unix)]
fn send_sigterm(pid: i32) -> Result<()> {
    send(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn send_sigkill(pid: i32) -> Result<()> {
    send(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn send(pid: i32, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), signal)
        .map_err(|e| LotelError::Supervise(format!("sending {signal} to pid {pid}: {e}")))
}

#[cfg(not(unix))]
fn send_sigterm(_pid: i32) -> Result<()> {
    Err(LotelError::Supervise(
        "signal delivery is not supported on this platform".to_string(),
    ))
}

#[cfg(not(unix))]
fn send_sigkill(_pid: i32) -> Result<()> {
    Err(LotelError::Supervise(
        "signal delivery is not supported on this platform".to_string(),
    ))
}

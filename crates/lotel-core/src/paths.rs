use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LotelError, Result};
use crate::signal::SignalKind;

/// Project-local config file honored when present in the working directory.
pub const PROJECT_CONFIG_NAME: &str = "lotel-collector.yaml";

/// Config file materialized (and later resolved) under the state directory.
pub const STATE_CONFIG_NAME: &str = "collector-config.yaml";

pub const STATE_FILE_NAME: &str = "collector.state";

pub const DB_FILE_NAME: &str = "lotel.db";

/// Minimal collector configuration for file-based exports. Exporter paths
/// use the `/data/` placeholder that gets rewritten at launch.
pub const DEFAULT_CONFIG: &str = "\
receivers:
  otlp:
    protocols:
      grpc:
        endpoint: 0.0.0.0:4317
      http:
        endpoint: 0.0.0.0:4318

processors:
  batch:
    timeout: 1s
    send_batch_size: 1024
    send_batch_max_size: 2048

exporters:
  file/traces:
    path: /data/traces/traces.jsonl
    format: json
  file/metrics:
    path: /data/metrics/metrics.jsonl
    format: json
  file/logs:
    path: /data/logs/logs.jsonl
    format: json

extensions:
  health_check:
    endpoint: 0.0.0.0:13133

service:
  extensions: [health_check]
  pipelines:
    traces:
      receivers: [otlp]
      processors: [batch]
      exporters: [file/traces]
    metrics:
      receivers: [otlp]
      processors: [batch]
      exporters: [file/metrics]
    logs:
      receivers: [otlp]
      processors: [batch]
      exporters: [file/logs]
  telemetry:
    logs:
      level: info
";

/// On-disk layout rooted at the per-user state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolves the state root: `$LOTEL_STATE_DIR` when set, otherwise
    /// `$HOME/.lotel`.
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = env::var("LOTEL_STATE_DIR") {
            return Ok(Self::at(PathBuf::from(dir)));
        }
        let home = env::var("HOME")
            .map_err(|_| LotelError::Config("cannot determine home directory".to_string()))?;
        Ok(Self::at(PathBuf::from(home).join(".lotel")))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(DB_FILE_NAME)
    }

    pub fn signal_file(&self, kind: SignalKind) -> PathBuf {
        self.data_dir().join(kind.as_str()).join(kind.file_name())
    }

    /// Creates the state root and the per-signal data subdirectories.
    pub fn ensure_layout(&self) -> Result<()> {
        for kind in SignalKind::ALL {
            let dir = self.data_dir().join(kind.as_str());
            fs::create_dir_all(&dir).map_err(|e| {
                LotelError::Io(format!("creating data directory {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Returns the configuration to launch from: a project-local
    /// `lotel-collector.yaml` in the working directory when one exists,
    /// otherwise the state-directory config, materializing the built-in
    /// default on first use.
    pub fn config_source(&self) -> Result<PathBuf> {
        self.config_source_from(env::current_dir().ok().as_deref())
    }

    fn config_source_from(&self, cwd: Option<&Path>) -> Result<PathBuf> {
        if let Some(cwd) = cwd {
            let local = cwd.join(PROJECT_CONFIG_NAME);
            if local.is_file() {
                return Ok(local);
            }
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| LotelError::Io(format!("creating state directory: {e}")))?;
        let fallback = self.root.join(STATE_CONFIG_NAME);
        if !fallback.exists() {
            fs::write(&fallback, DEFAULT_CONFIG)
                .map_err(|e| LotelError::Io(format!("writing default config: {e}")))?;
        }
        Ok(fallback)
    }

    /// Writes the launch copy of `source` with every literal `/data/`
    /// replaced by the actual data directory. Blind string replacement: the
    /// configuration is never parsed.
    pub fn materialize_resolved_config(&self, source: &Path, data_dir: &Path) -> Result<PathBuf> {
        let raw = fs::read_to_string(source)
            .map_err(|e| LotelError::Io(format!("reading config {}: {e}", source.display())))?;
        let resolved = raw.replace("/data/", &format!("{}/", data_dir.display()));

        fs::create_dir_all(&self.root)
            .map_err(|e| LotelError::Io(format!("creating state directory: {e}")))?;
        let target = self.root.join(STATE_CONFIG_NAME);
        fs::write(&target, resolved)
            .map_err(|e| LotelError::Io(format!("writing resolved config: {e}")))?;
        Ok(target)
    }
}

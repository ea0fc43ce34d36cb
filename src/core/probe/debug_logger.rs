use std::collections::HashMap;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use fs2::FileExt;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

pub const DEBUG_ENV: &str = "HOSTPROBE_DEBUG";
pub const DEBUG_LOG_ENV: &str = "HOSTPROBE_DEBUG_LOG";

const LOG_ROTATION_SIZE_MB: u64 = 8;
const MAX_ARCHIVES: usize = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

#[derive(Serialize, Debug, Clone)]
struct LogEntry {
    timestamp: String,                          // ISO-8601 with local offset
    level: String,                              // DEBUG, ERROR, PROBE
    component: String,
    event: String,
    message: String,                            // redacted
    correlation_id: String,                     // one per probe invocation
    fields: HashMap<String, serde_json::Value>,
}

/// Append-only JSON Lines file with size-based gzip rotation
struct RotatingSink {
    log_path: PathBuf,
    write_count: AtomicU32,
}

impl RotatingSink {
    fn new(log_path: PathBuf) -> Self {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Self {
            log_path,
            write_count: AtomicU32::new(0),
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        // First write of every process checks, then every ROTATION_CHECK_INTERVAL writes
        if self.write_count.fetch_add(1, Ordering::Relaxed) % ROTATION_CHECK_INTERVAL == 0 {
            let _ = self.rotate_if_needed();
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", line)
    }

    fn oversized(&self) -> bool {
        std::fs::metadata(&self.log_path)
            .map(|meta| meta.len() >= LOG_ROTATION_SIZE_MB * 1024 * 1024)
            .unwrap_or(false)
    }

    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.oversized() {
            return Ok(());
        }

        // Concurrent probes share the log; only the lock holder rotates
        let lock_path = self.log_path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Ok(());
        }

        let result = if self.oversized() {
            self.compress_current()
        } else {
            Ok(())
        };
        let _ = std::fs::remove_file(&lock_path);
        result
    }

    fn compress_current(&self) -> std::io::Result<()> {
        let (Some(dir), Some(stem)) = (self.log_path.parent(), self.stem()) else {
            return Ok(());
        };
        let archive_path = dir.join(format!(
            "{}.{}.gz",
            stem,
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let staging = self.log_path.with_extension("rotating");
        std::fs::rename(&self.log_path, &staging)?;

        let mut encoder = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        std::io::copy(&mut BufReader::new(File::open(&staging)?), &mut encoder)?;
        encoder.finish()?;
        std::fs::remove_file(&staging)?;

        let _ = self.prune_archives(dir, &stem);
        Ok(())
    }

    fn stem(&self) -> Option<String> {
        self.log_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }

    fn prune_archives(&self, dir: &Path, stem: &str) -> std::io::Result<()> {
        let prefix = format!("{}.", stem);
        let mut archives = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".gz") {
                archives.push((entry.path(), entry.metadata()?.modified()?));
            }
        }

        archives.sort_by_key(|(_, modified)| *modified);
        let excess = archives.len().saturating_sub(MAX_ARCHIVES);
        for (path, _) in archives.into_iter().take(excess) {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }
}

/// Structured diagnostics for a single probe invocation
///
/// Disabled unless `HOSTPROBE_DEBUG` is set; stdout is reserved for the
/// plugin output line, so all diagnostics go to the JSON Lines file.
/// Logging failures never reach the caller.
pub struct ProbeLogger {
    sink: Option<Mutex<RotatingSink>>,
    correlation_id: String,
    redaction_patterns: Vec<Regex>,
}

impl ProbeLogger {
    /// Configure from `HOSTPROBE_DEBUG` / `HOSTPROBE_DEBUG_LOG`
    pub fn from_env() -> Self {
        if Self::parse_debug_enabled() {
            Self::to_path(Self::log_path_from_env())
        } else {
            Self::disabled()
        }
    }

    pub fn disabled() -> Self {
        Self::build(None)
    }

    /// Always-enabled logger writing to `path`
    pub fn to_path(path: PathBuf) -> Self {
        Self::build(Some(Mutex::new(RotatingSink::new(path))))
    }

    fn build(sink: Option<Mutex<RotatingSink>>) -> Self {
        Self {
            sink,
            correlation_id: Uuid::new_v4().to_string()[..8].to_string(),
            redaction_patterns: Self::compile_redaction_patterns(),
        }
    }

    /// Supports: true/false, 1/0, yes/no, on/off (case insensitive)
    fn parse_debug_enabled() -> bool {
        env::var(DEBUG_ENV)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    fn log_path_from_env() -> PathBuf {
        if let Some(path) = env::var_os(DEBUG_LOG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".hostprobe");
        path.push("hostprobe-debug.log");
        path
    }

    fn compile_redaction_patterns() -> Vec<Regex> {
        [
            // userinfo in proxy strings: user:pass@host
            r"[^\s:@/]+:[^\s@/]*@",
            r"(?i)proxy-authorization[:\s]+[^\s\n]+",
            r"(?i)authorization[:\s]+[^\s\n]+",
            r"(?i)password[:\s=]+[^\s\n]+",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    }

    fn redact(&self, text: &str) -> String {
        self.redaction_patterns
            .iter()
            .fold(text.to_string(), |acc, regex| {
                regex.replace_all(&acc, "[REDACTED]").into_owned()
            })
    }

    fn log_sync(
        &self,
        level: &str,
        component: &str,
        event: &str,
        message: &str,
        fields: HashMap<String, serde_json::Value>,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };

        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339(),
            level: level.to_string(),
            component: component.to_string(),
            event: event.to_string(),
            message: self.redact(message),
            correlation_id: self.correlation_id.clone(),
            fields,
        };

        if let (Ok(sink), Ok(line)) = (sink.lock(), serde_json::to_string(&entry)) {
            let _ = sink.append(&line);
        }
    }

    pub fn debug_sync(&self, component: &str, event: &str, message: &str) {
        self.log_sync("DEBUG", component, event, message, HashMap::new());
    }

    pub fn error_sync(&self, component: &str, event: &str, message: &str) {
        self.log_sync("ERROR", component, event, message, HashMap::new());
    }

    // Typed probe lifecycle events

    pub fn probe_start(&self, mode: &str, target: &str, timeout_secs: u64) {
        let mut fields = HashMap::new();
        fields.insert("mode".to_string(), serde_json::Value::from(mode));
        fields.insert("target".to_string(), serde_json::Value::from(self.redact(target)));
        fields.insert("timeout_secs".to_string(), serde_json::Value::from(timeout_secs));

        self.log_sync(
            "PROBE",
            "Runner",
            "probe_start",
            &format!("Starting {} probe of {}", mode, target),
            fields,
        );
    }

    pub fn check_result(&self, check: &str, severity: &str, message: Option<&str>) {
        let mut fields = HashMap::new();
        fields.insert("check".to_string(), serde_json::Value::from(check));
        fields.insert("severity".to_string(), serde_json::Value::from(severity));

        self.log_sync(
            "PROBE",
            "Evaluator",
            "check_result",
            &format!("{} -> {} ({})", check, severity, message.unwrap_or("-")),
            fields,
        );
    }

    pub fn transport_failure(&self, kind: &str, message: &str) {
        let mut fields = HashMap::new();
        fields.insert("kind".to_string(), serde_json::Value::from(kind));

        self.log_sync(
            "ERROR",
            "TransportAcquirer",
            "transport_failure",
            message,
            fields,
        );
    }

    pub fn probe_end(&self, severity: &str, duration_ms: u64, exit_code: i32) {
        let mut fields = HashMap::new();
        fields.insert("severity".to_string(), serde_json::Value::from(severity));
        fields.insert("duration_ms".to_string(), serde_json::Value::from(duration_ms));
        fields.insert("exit_code".to_string(), serde_json::Value::from(exit_code));

        self.log_sync(
            "PROBE",
            "Runner",
            "probe_end",
            &format!("Probe completed: {} ({}ms)", severity, duration_ms),
            fields,
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Default for ProbeLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

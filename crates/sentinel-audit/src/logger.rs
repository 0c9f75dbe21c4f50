//! Audit sinks.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{info, warn};

use crate::entry::{ApprovalLogEntry, BreakGlassLogEntry, DecisionLogEntry};
use crate::error::{AuditError, Result};

/// A destination for audit records.
///
/// Implementations must not fail the caller: errors are reported through
/// `tracing` and the record is dropped.
pub trait Logger: Send + Sync {
    fn log_decision(&self, entry: &DecisionLogEntry);

    fn log_approval(&self, entry: &ApprovalLogEntry);

    fn log_break_glass(&self, entry: &BreakGlassLogEntry);
}

// ============================================================================
// JSON lines
// ============================================================================

/// Writes each record as one JSON object followed by a newline.
///
/// Writes happen on the caller's thread and flush before returning. Wrap
/// in a [`BackgroundLogger`] to keep file I/O off the decision path.
#[derive(Debug)]
pub struct JsonLinesLogger<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|_| AuditError::Poisoned)
    }

    fn write_line<T: Serialize>(&self, kind: &'static str, record: &T) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(kind, error = %e, "failed to serialize audit record");
                return;
            }
        };
        line.push(b'\n');

        let Ok(mut writer) = self.writer.lock() else {
            warn!(kind, "audit sink lock poisoned, record dropped");
            return;
        };
        if let Err(e) = writer.write_all(&line).and_then(|()| writer.flush()) {
            warn!(kind, error = %e, "failed to write audit record");
        }
    }
}

impl JsonLinesLogger<LineWriter<File>> {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(LineWriter::new(file)))
    }
}

impl JsonLinesLogger<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Logger for JsonLinesLogger<W> {
    fn log_decision(&self, entry: &DecisionLogEntry) {
        self.write_line("decision", entry);
    }

    fn log_approval(&self, entry: &ApprovalLogEntry) {
        self.write_line("approval", entry);
    }

    fn log_break_glass(&self, entry: &BreakGlassLogEntry) {
        self.write_line("break_glass", entry);
    }
}

// ============================================================================
// Tracing stream
// ============================================================================

/// Re-emits audit records as `tracing` events under the `sentinel::audit`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_decision(&self, entry: &DecisionLogEntry) {
        info!(
            target: "sentinel::audit",
            user = %entry.user,
            profile = %entry.profile,
            effect = %entry.effect,
            rule = %entry.rule,
            rule_index = entry.rule_index,
            approved_request_id = entry.approved_request_id.as_ref().map(|id| id.as_str()),
            break_glass_event_id = entry.break_glass_event_id.as_ref().map(|id| id.as_str()),
            drift_status = entry.drift_status.map(tracing::field::display),
            "credential decision"
        );
    }

    fn log_approval(&self, entry: &ApprovalLogEntry) {
        info!(
            target: "sentinel::audit",
            event = ?entry.event,
            request_id = %entry.request_id,
            requester = %entry.requester,
            profile = %entry.profile,
            status = %entry.status,
            approver = %entry.approver,
            "approval event"
        );
    }

    fn log_break_glass(&self, entry: &BreakGlassLogEntry) {
        info!(
            target: "sentinel::audit",
            event = ?entry.event,
            event_id = %entry.event_id,
            invoker = %entry.invoker,
            profile = %entry.profile,
            reason_code = %entry.reason_code,
            "break-glass event"
        );
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Feeds every record to each sink in order. Not transactional: a failing
/// sink does not stop the others.
#[derive(Default, Clone)]
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn Logger>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Logger for FanoutLogger {
    fn log_decision(&self, entry: &DecisionLogEntry) {
        for sink in &self.sinks {
            sink.log_decision(entry);
        }
    }

    fn log_approval(&self, entry: &ApprovalLogEntry) {
        for sink in &self.sinks {
            sink.log_approval(entry);
        }
    }

    fn log_break_glass(&self, entry: &BreakGlassLogEntry) {
        for sink in &self.sinks {
            sink.log_break_glass(entry);
        }
    }
}

// ============================================================================
// Background
// ============================================================================

enum Record {
    Decision(DecisionLogEntry),
    Approval(ApprovalLogEntry),
    BreakGlass(BreakGlassLogEntry),
}

/// Hands records to a dedicated writer thread so callers never wait on the
/// wrapped sink.
///
/// Records are written in the order they were logged. Dropping the logger
/// drains the queue and joins the writer thread.
pub struct BackgroundLogger {
    sender: Option<Sender<Record>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundLogger {
    pub fn spawn(sink: Arc<dyn Logger>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Record>();
        let worker = thread::Builder::new()
            .name("sentinel-audit".to_string())
            .spawn(move || {
                for record in receiver {
                    match record {
                        Record::Decision(entry) => sink.log_decision(&entry),
                        Record::Approval(entry) => sink.log_approval(&entry),
                        Record::BreakGlass(entry) => sink.log_break_glass(&entry),
                    }
                }
            })
            .map_err(AuditError::Spawn)?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn send(&self, kind: &'static str, record: Record) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(record).is_err() {
            warn!(kind, "audit writer thread gone, record dropped");
        }
    }
}

impl Logger for BackgroundLogger {
    fn log_decision(&self, entry: &DecisionLogEntry) {
        self.send("decision", Record::Decision(entry.clone()));
    }

    fn log_approval(&self, entry: &ApprovalLogEntry) {
        self.send("approval", Record::Approval(entry.clone()));
    }

    fn log_break_glass(&self, entry: &BreakGlassLogEntry) {
        self.send("break_glass", Record::BreakGlass(entry.clone()));
    }
}

impl Drop for BackgroundLogger {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("audit writer thread panicked");
        }
    }
}

impl std::fmt::Debug for BackgroundLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLogger").finish_non_exhaustive()
    }
}

// ============================================================================
// DecisionAuditLog
// ============================================================================

/// Append-only audit trail used by the decision path.
///
/// With no logger configured every append is a no-op.
#[derive(Clone, Default)]
pub struct DecisionAuditLog {
    logger: Option<Arc<dyn Logger>>,
}

impl DecisionAuditLog {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger: Some(logger),
        }
    }

    pub fn disabled() -> Self {
        Self { logger: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.logger.is_some()
    }

    pub fn append(&self, entry: &DecisionLogEntry) {
        if let Some(logger) = &self.logger {
            logger.log_decision(entry);
        }
    }

    pub fn append_approval(&self, entry: &ApprovalLogEntry) {
        if let Some(logger) = &self.logger {
            logger.log_approval(entry);
        }
    }

    pub fn append_break_glass(&self, entry: &BreakGlassLogEntry) {
        if let Some(logger) = &self.logger {
            logger.log_break_glass(entry);
        }
    }
}

impl std::fmt::Debug for DecisionAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionAuditLog")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sentinel_policy::{Decision, Request};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn entry(user: &str) -> DecisionLogEntry {
        let request = Request::new(user, "production", Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap());
        DecisionLogEntry::new(&request, &Decision::default_deny("no rule matched"), "policy.yaml")
    }

    #[derive(Default)]
    struct Counting {
        decisions: AtomicUsize,
    }

    impl Logger for Counting {
        fn log_decision(&self, _: &DecisionLogEntry) {
            self.decisions.fetch_add(1, Ordering::SeqCst);
        }
        fn log_approval(&self, _: &ApprovalLogEntry) {}
        fn log_break_glass(&self, _: &BreakGlassLogEntry) {}
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_one_object_per_line() {
        let logger = JsonLinesLogger::new(Vec::new());
        logger.log_decision(&entry("alice"));
        logger.log_decision(&entry("bob"));

        let written = String::from_utf8(logger.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["user"], "bob");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("decisions.log");

        JsonLinesLogger::open(&path).unwrap().log_decision(&entry("alice"));
        JsonLinesLogger::open(&path).unwrap().log_decision(&entry("bob"));

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let first: DecisionLogEntry = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first, entry("alice"));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = JsonLinesLogger::open(dir.path().join("missing").join("decisions.log"));
        assert!(matches!(result, Err(AuditError::Open { .. })));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let logger = JsonLinesLogger::new(BrokenWriter);
        logger.log_decision(&entry("alice"));
    }

    #[test]
    fn test_fanout_feeds_every_sink() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let fanout = FanoutLogger::new()
            .with_sink(a.clone())
            .with_sink(Arc::new(JsonLinesLogger::new(BrokenWriter)))
            .with_sink(b.clone());
        assert_eq!(fanout.len(), 3);

        fanout.log_decision(&entry("alice"));
        assert_eq!(a.decisions.load(Ordering::SeqCst), 1);
        assert_eq!(b.decisions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_log_is_noop() {
        let log = DecisionAuditLog::disabled();
        assert!(!log.is_enabled());
        log.append(&entry("alice"));
    }

    #[test]
    fn test_enabled_log_forwards() {
        let counting = Arc::new(Counting::default());
        let log = DecisionAuditLog::new(counting.clone());
        log.append(&entry("alice"));
        log.append(&entry("bob"));
        assert_eq!(counting.decisions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_background_logger_drains_on_drop() {
        let counting = Arc::new(Counting::default());
        let background = BackgroundLogger::spawn(counting.clone()).unwrap();
        for user in ["alice", "bob", "carol"] {
            background.log_decision(&entry(user));
        }
        drop(background);
        assert_eq!(counting.decisions.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_background_file_sink_keeps_order() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("decisions.log");

        let sink = Arc::new(JsonLinesLogger::open(&path).unwrap());
        let log = DecisionAuditLog::new(Arc::new(BackgroundLogger::spawn(sink).unwrap()));
        log.append(&entry("alice"));
        log.append(&entry("bob"));
        drop(log);

        let contents = fs::read_to_string(&path).unwrap();
        let users: Vec<String> = contents
            .lines()
            .map(|line| serde_json::from_str::<DecisionLogEntry>(line).unwrap().user)
            .collect();
        assert_eq!(users, ["alice", "bob"]);
    }

    #[test]
    fn test_tracing_logger_does_not_panic() {
        TracingLogger.log_decision(&entry("alice"));
    }
}

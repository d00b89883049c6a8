//! JSONL transcript of run events.
//!
//! Each [`Event`] is serialized as one JSON line (sequence, kind, timestamp,
//! step, worker and payload), appended through a buffered writer.

use council_application::events::EventSubscription;
use council_domain::Event;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Event log that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLog {
    /// Create a log writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, event: &Event) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }

    /// Record every event of `subscription` until the bus goes away.
    ///
    /// Returns how many events were written.
    pub async fn follow(&self, mut subscription: EventSubscription) -> usize {
        let mut written = 0;
        while let Some(event) = subscription.recv().await {
            self.record(&event);
            written += 1;
        }
        if subscription.dropped() > 0 {
            warn!(
                dropped = subscription.dropped(),
                path = %self.path.display(),
                "Event log fell behind; some events are missing"
            );
        }
        self.flush();
        written
    }

    pub fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::events::EventBus;
    use council_domain::{EventDraft, EventKind, WorkerId};
    use std::io::Read;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        let mut content = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_record_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.events.jsonl");
        let log = JsonlEventLog::new(&path).unwrap();

        let bus = EventBus::new();
        log.record(&bus.publish(EventDraft::new(EventKind::RunStarted)));
        log.record(
            &bus.publish(
                EventDraft::new(EventKind::WorkerFailed)
                    .step("review")
                    .worker(WorkerId::new("critic"))
                    .payload(serde_json::json!({ "error": "timeout" })),
            ),
        );
        drop(log);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "run_started");
        assert_eq!(lines[0]["sequence"], 0);
        assert!(lines[0].get("step_name").is_none());
        assert_eq!(lines[1]["step_name"], "review");
        assert_eq!(lines[1]["worker_id"], "critic");
        assert_eq!(lines[1]["payload"]["error"], "timeout");
    }

    #[tokio::test]
    async fn test_follow_drains_until_bus_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let log = JsonlEventLog::new(&path).unwrap();

        let bus = EventBus::new();
        let subscription = bus.subscribe();
        for _ in 0..3 {
            bus.publish(EventDraft::new(EventKind::StepStarted));
        }
        drop(bus);

        assert_eq!(log.follow(subscription).await, 3);
        let sequences: Vec<_> = read_lines(&path).iter().map(|l| l["sequence"].clone()).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }
}

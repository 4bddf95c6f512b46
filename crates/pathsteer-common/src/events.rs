//! Append-only JSONL event log.
//!
//! One JSON object per line: `{"ts": ..., "run": ..., "event": ..., "data": ...}`.
//! The log is the replayable record of every decision the daemon makes;
//! the writer is flushed after each event so a crash loses at most the
//! line being written.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde_json::json;

pub struct EventLog {
    out: Box<dyn Write + Send>,
    run_id: String,
}

impl EventLog {
    /// Open (append) the run log file.
    pub fn open(path: &Path, run_id: &str) -> std::io::Result<EventLog> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(EventLog::to_writer(Box::new(file), run_id))
    }

    /// Log to an arbitrary writer. Tests use a `Vec<u8>` or a sink.
    pub fn to_writer(out: Box<dyn Write + Send>, run_id: &str) -> EventLog {
        EventLog {
            out,
            run_id: run_id.to_string(),
        }
    }

    /// Fallback log to stderr when the log directory is unwritable.
    pub fn stderr(run_id: &str) -> EventLog {
        EventLog::to_writer(Box::new(std::io::stderr()), run_id)
    }

    /// Append one event. Write errors are swallowed: the event log must
    /// never take the control loop down.
    pub fn emit(&mut self, event: &str, data: serde_json::Value) {
        let ts = chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.3f")
            .to_string();
        let line = json!({
            "ts": ts,
            "run": self.run_id,
            "event": event,
            "data": data,
        });
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared buffer writer so the test can inspect what was emitted.
    #[derive(Clone)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emits_one_json_object_per_line() {
        let buf = Shared(Arc::new(Mutex::new(Vec::new())));
        let mut log = EventLog::to_writer(Box::new(buf.clone()), "run_1");
        log.emit("startup", json!({"version": "1.0"}));
        log.emit("shutdown", json!({}));

        let raw = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(raw).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["run"], "run_1");
        assert_eq!(first["event"], "startup");
        assert_eq!(first["data"]["version"], "1.0");
    }
}

//! Filesystem command queue.
//!
//! Operators (and the web UI backend) drop `<timestamp>-<id>.cmd` files
//! into the queue directory; the timestamp prefix makes lexicographic
//! order FIFO order. Each file holds a single command line. Files are
//! unlinked only after a successful read, so a producer racing the scan
//! loses nothing — the command is picked up next tick.
//!
//! A single legacy `command` file is honoured as a fallback.

use std::path::Path;

/// One queued command: the file name doubles as the command id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub id: String,
    pub line: String,
}

/// Drain the queue in FIFO order, then the legacy file.
pub async fn drain(dir: &Path, legacy: &Path) -> Vec<QueuedCommand> {
    let mut names: Vec<String> = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name.ends_with(".cmd") {
                continue;
            }
            names.push(name);
        }
    }
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        if let Ok(raw) = tokio::fs::read_to_string(&path).await {
            if let Some(line) = first_line(&raw) {
                out.push(QueuedCommand {
                    id: name.clone(),
                    line,
                });
            }
            let _ = tokio::fs::remove_file(&path).await;
        }
    }

    if let Ok(raw) = tokio::fs::read_to_string(legacy).await {
        if let Some(line) = first_line(&raw) {
            out.push(QueuedCommand {
                id: "legacy".to_string(),
                line,
            });
        }
        let _ = tokio::fs::remove_file(legacy).await;
    }

    out
}

fn first_line(raw: &str) -> Option<String> {
    let line = raw.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}

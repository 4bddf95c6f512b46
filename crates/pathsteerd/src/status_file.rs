//! Atomic status publication.
//!
//! The snapshot is written to a temp file, fsynced, and renamed over the
//! canonical path, so a reader either sees the previous complete document
//! or the new one — never a torn write.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use pathsteer_engine::snapshot::StatusSnapshot;

pub async fn publish(
    snapshot: &StatusSnapshot,
    tmp_path: &Path,
    final_path: &Path,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(snapshot)?;

    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(&body).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp_path, final_path).await?;
    Ok(())
}

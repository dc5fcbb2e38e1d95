//! Reachability check for the file host

use anyhow::{Context, Result};
use opendal::Operator;
use tracing::debug;

use crate::client::FILES_PREFIX;

/// List the avatar prefix. Succeeds on an empty bucket.
pub async fn check_health(op: &Operator) -> Result<()> {
    let prefix = format!("{FILES_PREFIX}/");
    let entries = op
        .list(&prefix)
        .await
        .with_context(|| format!("file host health check failed listing {prefix}"))?;
    debug!(prefix = %prefix, entries = entries.len(), "file host reachable");
    Ok(())
}

//! `list` command: local and/or remote catalogs filtered by query mode.

use super::{destination_from_config, scan_local};
use crate::catalog::{select, BackupRecord, RemoteCatalogClient, Selection};
use crate::config::Config;
use serde::Serialize;
use std::io::Write;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Remote,
    All,
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Scope::Local),
            "remote" => Ok(Scope::Remote),
            "all" => Ok(Scope::All),
            other => Err(format!("unknown scope '{other}' (local, remote, all)")),
        }
    }
}

/// One output line for `all` listings.
#[derive(Serialize)]
struct Listed<'a> {
    #[serde(flatten)]
    record: &'a BackupRecord,
    size: Option<u64>,
    description: Option<&'a str>,
}

/// Write the selection: bare names for single picks, JSON lines otherwise.
pub fn write_selection(out: &mut impl Write, selection: Selection<'_>) -> anyhow::Result<()> {
    match selection {
        Selection::One(record) => writeln!(out, "{}", record.name)?,
        Selection::All(records) => {
            for record in records {
                let line = Listed {
                    record,
                    size: record.effective_size(),
                    description: record.description(),
                };
                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

pub async fn run(
    config: &Config,
    scope: Scope,
    mode: &str,
    parse_metadata: bool,
    out: &mut impl Write,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if matches!(scope, Scope::Local | Scope::All) {
        let catalog = scan_local(config, cancel).await?;
        match select(&catalog.backups, mode) {
            Ok(selection) => write_selection(out, selection)?,
            // with both scopes requested, an empty local side must not hide
            // the remote one
            Err(e) if scope == Scope::All => warn!("local backups: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let remote_wanted = scope == Scope::Remote || (scope == Scope::All && config.remote_enabled());
    if remote_wanted {
        let client = RemoteCatalogClient::new(destination_from_config(config)?);
        let backups = client.list(parse_metadata, cancel).await?;
        match select(&backups, mode) {
            Ok(selection) => write_selection(out, selection)?,
            Err(e) if scope == Scope::All => warn!("remote backups: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

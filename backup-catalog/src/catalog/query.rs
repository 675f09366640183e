//! Selection of catalog entries by query mode.

use super::BackupRecord;
use crate::utils::errors::{BackupError, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Latest,
    Previous,
    All,
}

impl FromStr for QueryMode {
    type Err = BackupError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "latest" | "last" | "l" => Ok(QueryMode::Latest),
            "penult" | "prev" | "previous" | "p" => Ok(QueryMode::Previous),
            "all" | "" => Ok(QueryMode::All),
            other => Err(BackupError::UnrecognizedMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    One(&'a BackupRecord),
    All(&'a [BackupRecord]),
}

impl<'a> Selection<'a> {
    pub fn records(&self) -> &'a [BackupRecord] {
        match *self {
            Selection::One(record) => std::slice::from_ref(record),
            Selection::All(records) => records,
        }
    }
}

/// Pick entries from an ordered catalog (oldest first).
pub fn select<'a>(catalog: &'a [BackupRecord], mode: &str) -> Result<Selection<'a>> {
    select_mode(catalog, mode.parse()?)
}

pub fn select_mode(catalog: &[BackupRecord], mode: QueryMode) -> Result<Selection<'_>> {
    match mode {
        QueryMode::Latest => catalog
            .last()
            .map(Selection::One)
            .ok_or(BackupError::EmptyCatalog),
        QueryMode::Previous => match catalog {
            [.., penult, _] => Ok(Selection::One(penult)),
            _ => Err(BackupError::InsufficientHistory),
        },
        QueryMode::All => Ok(Selection::All(catalog)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Location;
    use chrono::{TimeZone, Utc};

    fn catalog(names: &[&str]) -> Vec<BackupRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                BackupRecord::bare(*name, Location::Local, Utc.timestamp_opt(i as i64 * 60, 0).unwrap())
            })
            .collect()
    }

    fn selected_name(selection: Selection<'_>) -> &str {
        match selection {
            Selection::One(record) => &record.name,
            Selection::All(_) => panic!("expected a single record"),
        }
    }

    #[test]
    fn test_latest_aliases() {
        let backups = catalog(&["a", "b", "c"]);
        for mode in ["latest", "last", "l"] {
            assert_eq!(selected_name(select(&backups, mode).unwrap()), "c");
        }
    }

    #[test]
    fn test_previous_aliases() {
        let backups = catalog(&["a", "b", "c"]);
        for mode in ["penult", "prev", "previous", "p"] {
            assert_eq!(selected_name(select(&backups, mode).unwrap()), "b");
        }
    }

    #[test]
    fn test_latest_and_previous_are_disjoint() {
        let backups = catalog(&["a", "b"]);
        let latest = selected_name(select(&backups, "latest").unwrap()).to_string();
        let previous = selected_name(select(&backups, "previous").unwrap()).to_string();
        assert_ne!(latest, previous);
    }

    #[test]
    fn test_all_returns_everything_in_order() {
        let backups = catalog(&["a", "b", "c"]);
        for mode in ["all", ""] {
            let selection = select(&backups, mode).unwrap();
            assert_eq!(selection.records().len(), 3);
            assert_eq!(selection.records()[0].name, "a");
        }

        let empty: Vec<BackupRecord> = Vec::new();
        assert!(select(&empty, "all").unwrap().records().is_empty());
    }

    #[test]
    fn test_empty_catalog() {
        let empty: Vec<BackupRecord> = Vec::new();
        assert!(matches!(select(&empty, "latest"), Err(BackupError::EmptyCatalog)));
        assert!(matches!(select(&empty, "prev"), Err(BackupError::InsufficientHistory)));
    }

    #[test]
    fn test_single_entry_has_no_previous() {
        let backups = catalog(&["only"]);
        assert!(matches!(select(&backups, "penult"), Err(BackupError::InsufficientHistory)));
        assert_eq!(selected_name(select(&backups, "l").unwrap()), "only");
    }

    #[test]
    fn test_unknown_mode() {
        let backups = catalog(&["a"]);
        match select(&backups, "newest") {
            Err(BackupError::UnrecognizedMode(mode)) => assert_eq!(mode, "newest"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

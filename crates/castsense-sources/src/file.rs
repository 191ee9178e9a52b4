//! Hand-maintained roster file.

use std::path::{Path, PathBuf};

use castsense_core::{Entity, Error, Result};
use serde::Deserialize;
use tracing::info;

use crate::provider::RosterProvider;

/// Either `"Ace"` or `{"canonical_name": "Ace"}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RosterEntry {
    Name(String),
    Entity(Entity),
}

/// Roster read from a JSON array. Applies to whichever season is asked for.
pub struct FileRoster {
    path: PathBuf,
}

impl FileRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn parse_roster_json(json: &str) -> Result<Vec<Entity>> {
    let entries: Vec<RosterEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|e| match e {
            RosterEntry::Name(name) => Entity::new(name),
            RosterEntry::Entity(entity) => entity,
        })
        .collect())
}

impl RosterProvider for FileRoster {
    async fn get_entities(&self, _season: u32) -> Result<Vec<Entity>> {
        if !self.exists() {
            return Err(Error::NotFound(format!(
                "roster file {}",
                self.path.display()
            )));
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        let roster = parse_roster_json(&json)?;
        info!("Roster file {}: {} entities", self.path.display(), roster.len());
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mixed_entries() {
        let roster = parse_roster_json(r#"["Huda", {"canonical_name": "Jeremiah"}]"#).unwrap();
        assert_eq!(roster, vec![Entity::new("Huda"), Entity::new("Jeremiah")]);
        assert!(parse_roster_json(r#"{"names": []}"#).is_err());
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        let missing = FileRoster::new(&path);
        assert!(matches!(missing.get_entities(7).await, Err(Error::NotFound(_))));

        std::fs::write(&path, r#"["Amaya", "Pepe"]"#).unwrap();
        let roster = FileRoster::new(&path).get_entities(7).await.unwrap();
        assert_eq!(roster.len(), 2);
    }
}

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog read: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One row of the static reference dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillCatalogEntry {
    pub skill_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Name ⇄ identifier mapping for every known skill.
///
/// Loaded once at process start and read-only thereafter. Qualification
/// cannot run without it, so a load failure is surfaced as fatal by the
/// caller rather than degraded around.
#[derive(Debug, Default)]
pub struct SkillCatalog {
    by_name: HashMap<String, i32>,
    by_id: HashMap<i32, String>,
}

impl SkillCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read(path)?;
        let entries: Vec<SkillCatalogEntry> = serde_json::from_slice(&raw)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<SkillCatalogEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for entry in entries {
            if by_name.contains_key(&entry.name) {
                tracing::warn!(name = %entry.name, "duplicate skill name in catalog, keeping first");
                continue;
            }
            by_name.insert(entry.name.clone(), entry.skill_id);
            by_id.insert(entry.skill_id, entry.name);
        }
        Self { by_name, by_id }
    }

    pub fn id_for(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    pub fn name_for(&self, id: i32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn entry(id: i32, name: &str) -> SkillCatalogEntry {
        SkillCatalogEntry {
            skill_id: id,
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn resolves_both_directions() {
        let catalog = SkillCatalog::from_entries(vec![entry(3300, "Gunnery"), entry(3450, "Afterburner")]);
        assert_eq!(catalog.id_for("Gunnery"), Some(3300));
        assert_eq!(catalog.name_for(3450), Some("Afterburner"));
        assert_eq!(catalog.id_for("Warp Drive Operation"), None);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn duplicate_names_keep_the_first_row() {
        let catalog = SkillCatalog::from_entries(vec![entry(1, "Gunnery"), entry(2, "Gunnery")]);
        assert_eq!(catalog.id_for("Gunnery"), Some(1));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn loads_the_json_reference_dataset() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("skills.json");
        std::fs::write(
            &path,
            r#"[
                {"skill_id": 3300, "name": "Gunnery", "description": "Basic turret operation."},
                {"skill_id": 3450, "name": "Afterburner"}
            ]"#,
        )
        .expect("write dataset");

        let catalog = SkillCatalog::load(&path).expect("load");
        assert_eq!(catalog.id_for("Afterburner"), Some(3450));
    }

    #[test]
    fn malformed_dataset_is_a_parse_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("skills.json");
        std::fs::write(&path, b"not json").expect("write");
        assert!(matches!(
            SkillCatalog::load(&path),
            Err(CatalogError::Parse(_))
        ));
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::model::{Dependency, Solution, TypeNameTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionSnapshot {
    pub solutions: Vec<Solution>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default = "TypeNameTable::empty")]
    pub type_names: TypeNameTable,
}

impl SessionSnapshot {
    pub fn new(solutions: Vec<Solution>, dependencies: Vec<Dependency>) -> Self {
        Self {
            solutions,
            dependencies,
            type_names: TypeNameTable::empty(),
        }
    }

    pub fn effective_type_names(&self) -> TypeNameTable {
        TypeNameTable::default().merged_with(&self.type_names)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot `{}`", path.display()))?;
        let snapshot = if is_yaml(path) {
            serde_yaml::from_str::<Self>(&raw)
                .with_context(|| format!("failed to parse snapshot `{}`", path.display()))?
        } else {
            serde_json::from_str::<Self>(&raw)
                .with_context(|| format!("failed to parse snapshot `{}`", path.display()))?
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = if is_yaml(path) {
            serde_yaml::to_string(self).context("failed to serialize snapshot as YAML")?
        } else {
            serde_json::to_string_pretty(self).context("failed to serialize snapshot as JSON")?
        };
        fs::write(path, rendered)
            .with_context(|| format!("failed to write snapshot `{}`", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for solution in &self.solutions {
            ensure!(
                !solution.solution_id.trim().is_empty(),
                "snapshot contains a solution without an id (`{}`)",
                solution.name
            );
            ensure!(
                seen.insert(solution.solution_id.as_str()),
                "snapshot contains duplicate solution id `{}`",
                solution.solution_id
            );
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::SessionSnapshot;
    use crate::model::COMPONENT_TYPE_WORKFLOW;
    use crate::test_support::{dependency, remove_dir_if_exists, solution, temp_path};

    #[test]
    fn snapshot_saves_and_loads_json_and_yaml() {
        let root = temp_path("snapshot-formats");
        fs::create_dir_all(&root).expect("temp dir should be created");
        let snapshot = SessionSnapshot::new(
            vec![solution("A", "alpha", "Acme"), solution("B", "beta", "Acme")],
            vec![dependency("a1", "A", "b1", "B")],
        );

        for name in ["session.json", "session.yaml"] {
            let path = root.join(name);
            snapshot.save(&path).expect("snapshot should save");
            let loaded = SessionSnapshot::load(&path).expect("snapshot should load");
            assert_eq!(loaded, snapshot, "{name} should reload unchanged");
        }

        remove_dir_if_exists(&root);
    }

    #[test]
    fn snapshot_rejects_duplicate_solution_ids() {
        let root = temp_path("snapshot-duplicates");
        fs::create_dir_all(&root).expect("temp dir should be created");
        let path = root.join("dup.json");
        let snapshot = SessionSnapshot::new(
            vec![solution("A", "alpha", "Acme"), solution("A", "again", "Acme")],
            Vec::new(),
        );
        snapshot.save(&path).expect("snapshot should save");

        let error = SessionSnapshot::load(&path).expect_err("load should fail");
        assert!(error.to_string().contains("duplicate solution id `A`"));

        remove_dir_if_exists(&root);
    }

    #[test]
    fn effective_type_names_overlay_snapshot_entries() {
        let mut snapshot = SessionSnapshot::new(Vec::new(), Vec::new());
        snapshot.type_names.insert(COMPONENT_TYPE_WORKFLOW, "Process");

        let names = snapshot.effective_type_names();
        assert_eq!(names.get(COMPONENT_TYPE_WORKFLOW), Some("Process"));
        assert_eq!(names.get(300), Some("Canvas App"));
    }
}

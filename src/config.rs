use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::assessment::AssessmentKind;

/// Where each raw export lives.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFiles {
    paths: HashMap<AssessmentKind, PathBuf>,
}

impl SourceFiles {
    /// `<dir>/<Table>.csv` for every assessment.
    pub fn in_dir(dir: &Path) -> Self {
        let paths = AssessmentKind::RUN_ORDER
            .into_iter()
            .map(|kind| (kind, dir.join(format!("{}.csv", kind.table_name()))))
            .collect();
        SourceFiles { paths }
    }

    /// Overrides paths from a JSON object keyed by table name. Relative paths
    /// resolve against the manifest's directory.
    pub fn with_manifest(mut self, manifest: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(manifest)
            .with_context(|| format!("failed to read manifest {}", manifest.display()))?;
        let entries: HashMap<String, PathBuf> = serde_json::from_str(&text)
            .with_context(|| format!("invalid manifest {}", manifest.display()))?;
        let base = manifest.parent().unwrap_or(Path::new("."));

        for (name, path) in entries {
            let kind: AssessmentKind = name.parse()?;
            self.paths.insert(kind, base.join(path));
        }
        Ok(self)
    }

    pub fn path(&self, kind: AssessmentKind) -> &Path {
        &self.paths[&kind]
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    /// Set only for commands that read raw exports.
    pub sources: Option<SourceFiles>,
}

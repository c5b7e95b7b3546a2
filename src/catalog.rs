//! Achievement catalog files.
//!
//! Achievements are authored as `[[achievement]]` tables in `.toml` files and
//! pushed into the store with [`ProgressionEngine::sync_catalog`]:
//!
//! ```toml
//! [[achievement]]
//! id = "5b0c7e0a-7d1e-4c55-9c1e-2f8f5e8f3a10"
//! name = "Getting Things Done"
//! xp_reward = 50
//! progress_max = 5
//! trigger = { type = "count_based", category = "tasks" }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::ProgressionEngine;
use crate::error::{Error, Result};
use crate::model::{AchievementDefinition, AchievementId, Scope, Trigger};
use crate::store::ProgressionStore;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    achievement: Vec<CatalogEntry>,
}

/// One `[[achievement]]` table.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: AchievementId,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_scope")]
    scope: String,
    scope_ref: Option<Uuid>,
    trigger: Trigger,
    progress_max: Option<i64>,
    #[serde(default)]
    xp_reward: i64,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    order_index: i32,
}

fn default_scope() -> String {
    "global".to_string()
}

fn default_active() -> bool {
    true
}

impl CatalogEntry {
    fn into_definition(self) -> Result<AchievementDefinition> {
        let definition = AchievementDefinition {
            id: self.id,
            name: self.name,
            description: self.description,
            scope: Scope::from_parts(&self.scope, self.scope_ref)?,
            trigger: self.trigger,
            progress_max: self.progress_max,
            xp_reward: self.xp_reward,
            is_active: self.is_active,
            order_index: self.order_index,
        };
        definition.validate()?;
        Ok(definition)
    }
}

/// A validated set of achievement definitions with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    definitions: Vec<AchievementDefinition>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse one catalog document. `origin` names it in error messages.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self> {
        let mut catalog = Self::empty();
        catalog.extend_from_str(content, origin)?;
        Ok(catalog)
    }

    /// Load every `.toml` file in `dir`, in file name order.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("cannot read catalog dir {}: {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::empty();
        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            catalog.extend_from_str(&content, &path.display().to_string())?;
        }
        Ok(catalog)
    }

    fn extend_from_str(&mut self, content: &str, origin: &str) -> Result<()> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::InvalidDefinition(format!("bad catalog {origin}: {e}")))?;

        let mut seen: HashSet<AchievementId> = self.definitions.iter().map(|d| d.id).collect();
        for entry in file.achievement {
            let definition = entry.into_definition().map_err(|e| match e {
                Error::InvalidDefinition(msg) => Error::InvalidDefinition(format!("{origin}: {msg}")),
                other => other,
            })?;
            if !seen.insert(definition.id) {
                return Err(Error::InvalidDefinition(format!(
                    "{origin}: duplicate achievement id {}",
                    definition.id
                )));
            }
            self.definitions.push(definition);
        }
        Ok(())
    }

    /// Look up a definition by id.
    pub fn get(&self, id: AchievementId) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Insert or update every definition in `catalog`. Returns the count.
    ///
    /// Definitions missing from the catalog are left as they are; retire
    /// them with `is_active = false` instead of deleting them, since earned
    /// progress records point at them.
    pub async fn sync_catalog(&self, catalog: &Catalog) -> Result<usize> {
        for definition in catalog.definitions() {
            self.store().upsert_achievement(definition).await?;
        }
        info!(achievements = catalog.len(), "catalog synced");
        Ok(catalog.len())
    }
}

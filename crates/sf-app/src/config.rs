//! Loader configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sf_store::{DEFAULT_MAX_TRIES, SchemaVariant, StoreOptions};

use crate::error::{AppError, AppResult};

/// Where a geodata table keeps its ids and per-timestep values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub table: String,
    pub id_column: String,
    /// One column per timestep, in time order.
    pub value_columns: Vec<String>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            table: "Surface".to_string(),
            id_column: "TriangleId".to_string(),
            value_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Swap edge endpoints so the higher invert is upstream.
    pub normalize_orientation: bool,
    pub max_search_probes: usize,
    /// Force a schema variant instead of probing.
    pub schema: Option<SchemaVariant>,
    pub busy_timeout_ms: u64,
    /// Bound on waiting for a pooled handle. `None` waits forever.
    pub acquire_timeout_ms: Option<u64>,
    /// Bulk-load every pipe timeline up front instead of on demand.
    pub dense_pipes: bool,
    pub dense_manholes: bool,
    /// Material ids whose flux and concentration are loaded.
    pub materials: Vec<u32>,
    pub surface: SurfaceConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            normalize_orientation: true,
            max_search_probes: DEFAULT_MAX_TRIES,
            schema: None,
            busy_timeout_ms: 5000,
            acquire_timeout_ms: None,
            dense_pipes: true,
            dense_manholes: true,
            materials: Vec::new(),
            surface: SurfaceConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config: LoaderConfig = match ext.as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(AppError::Config(format!(
                    "unsupported config format: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_search_probes == 0 {
            return Err(AppError::Config(
                "max_search_probes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with every family loaded on demand, for single-entity reads.
    pub fn on_demand(&self) -> Self {
        Self {
            dense_pipes: false,
            dense_manholes: false,
            ..self.clone()
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            schema: self.schema,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            acquire_timeout: self.acquire_timeout_ms.map(Duration::from_millis),
        }
    }
}

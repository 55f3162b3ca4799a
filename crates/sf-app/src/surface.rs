//! Per-triangle 2D surface series.

use std::path::Path;
use std::sync::Arc;

use sf_core::LoadMetrics;
use sf_store::{FeatureTable, GeodataStore, SqliteFeatureTable};
use tracing::debug;

use crate::config::LoaderConfig;
use crate::error::{AppError, AppResult};

/// One triangle's values, one per timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSeries {
    pub triangle_id: i64,
    pub values: Vec<f64>,
    /// False when the triangle was not found and `values` are zero-filled.
    pub found: bool,
}

/// Open the geodata table named in `config.surface`.
pub fn open_surface(
    path: &Path,
    config: &LoaderConfig,
    max_id: i64,
    metrics: Arc<LoadMetrics>,
) -> AppResult<GeodataStore<SqliteFeatureTable>> {
    let surface = &config.surface;
    if surface.value_columns.is_empty() {
        return Err(AppError::Config(
            "surface.value_columns lists no timestep columns".to_string(),
        ));
    }
    let value_columns: Vec<&str> = surface.value_columns.iter().map(String::as_str).collect();
    let store = GeodataStore::open_sqlite(
        path,
        &surface.table,
        &surface.id_column,
        &value_columns,
        max_id,
        metrics,
    )?;
    Ok(store.with_max_tries(config.max_search_probes))
}

/// A triangle's series. A triangle the search cannot find yields zeros.
pub fn surface_series<T: FeatureTable + 'static>(
    store: &GeodataStore<T>,
    triangle_id: i64,
) -> AppResult<SurfaceSeries> {
    match store.series(triangle_id) {
        Ok(values) => Ok(SurfaceSeries {
            triangle_id,
            values,
            found: true,
        }),
        Err(e) if e.is_not_found() => {
            debug!(triangle_id, "no surface feature, using zeros");
            Ok(SurfaceSeries {
                triangle_id,
                values: vec![0.0; store.series_len()],
                found: false,
            })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_store::{FieldValue, IndexlessTableSearch, MemoryFeatureTable};

    #[test]
    fn missing_triangle_is_zero_filled() {
        let rows: Vec<Vec<FieldValue>> = [2_i64, 4, 8]
            .iter()
            .map(|&id| vec![FieldValue::Integer(id), FieldValue::Real(id as f64 * 0.5)])
            .collect();
        let store = GeodataStore::new(
            move || Ok(MemoryFeatureTable::new(rows.clone())),
            IndexlessTableSearch::new(0, 8),
            vec![1],
            Arc::new(LoadMetrics::new()),
        );

        let found = surface_series(&store, 4).unwrap();
        assert!(found.found);
        assert_eq!(found.values, vec![2.0]);

        let missing = surface_series(&store, 6).unwrap();
        assert!(!missing.found);
        assert_eq!(missing.values, vec![0.0]);
    }

    #[test]
    fn surface_needs_value_columns() {
        let err = open_surface(
            Path::new("/nonexistent.db"),
            &LoaderConfig::default(),
            10,
            Arc::new(LoadMetrics::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}

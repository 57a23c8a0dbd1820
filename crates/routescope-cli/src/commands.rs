//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use routescope_client::{ExecutionPlan, ExecutionService, MemoryEngine, QueryEngine, ServiceConfig};
use routescope_lang::{compile_query, CompileError};
use routescope_proto::{
    BboxFields, CompiledQuery, ExecutionContext, LatLng, QueryResult, SpatialQuery,
};
use serde::Serialize;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid point '{0}': expected LAT,LNG")]
    Point(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Predicate(#[from] routescope_core::Error),

    #[error(transparent)]
    Client(#[from] routescope_client::Error),
}

/// A query and the context it runs under.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub query: SpatialQuery,
    pub context: ExecutionContext,
}

impl Inputs {
    /// Read the query and context JSON files.
    ///
    /// `point` overrides the context's selected point.
    pub fn load(query: &Path, context: &Path, point: Option<&str>) -> Result<Self, CliError> {
        let query: SpatialQuery = read_json(query)?;
        let mut context: ExecutionContext = read_json(context)?;
        if let Some(p) = point {
            context.point = Some(parse_point(p)?);
        }
        Ok(Self { query, context })
    }
}

/// Parse `LAT,LNG`.
pub fn parse_point(text: &str) -> Result<LatLng, CliError> {
    let (lat, lng) = text
        .split_once(',')
        .ok_or_else(|| CliError::Point(text.to_string()))?;
    match (lat.trim().parse(), lng.trim().parse()) {
        (Ok(lat), Ok(lng)) => Ok(LatLng::new(lat, lng)),
        _ => Err(CliError::Point(text.to_string())),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// How a query would run.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub description: String,
    pub hash: String,
    pub tier: String,
    pub predicate: String,
    pub statement: String,
    pub post_filter: bool,
}

/// Validate and compile.
pub fn compile(inputs: &Inputs) -> Result<CompiledQuery, CliError> {
    Ok(compile_query(&inputs.query, &inputs.context)?)
}

/// Compile and plan the query without running it.
pub fn explain(inputs: &Inputs, config: &ServiceConfig) -> Result<Explanation, CliError> {
    let compiled = compile(inputs)?;
    let plan = ExecutionPlan::new(&compiled, &inputs.context, config)?;

    Ok(Explanation {
        description: inputs.query.describe(),
        hash: compiled.hash.clone(),
        tier: plan.tier.as_str().to_string(),
        predicate: plan.request.predicate.to_sql(),
        statement: plan.request.to_sql(),
        post_filter: plan.post_filter.is_some(),
    })
}

/// Load GeoJSON datasets into an in-memory engine.
///
/// Geometry lands in the context's GeoJSON column (falling back to its
/// geometry column, then `geometry`), with bbox columns synthesized.
pub fn memory_engine(
    routes: Option<&Path>,
    stops: Option<&Path>,
    ctx: &ExecutionContext,
    config: &ServiceConfig,
) -> Result<MemoryEngine, CliError> {
    let engine = MemoryEngine::new();
    let geometry_field = ctx
        .geojson_field
        .as_deref()
        .or(ctx.geometry_field.as_deref())
        .unwrap_or("geometry");
    let bbox = ctx.bbox_fields.clone().unwrap_or_default();

    for (path, table) in [(routes, &config.routes_table), (stops, &config.stops_table)] {
        if let Some(path) = path {
            let data: serde_json::Value = read_json(path)?;
            let n = load(&engine, table, &data, geometry_field, &bbox)?;
            tracing::info!(table = %table, rows = n, path = %path.display(), "loaded dataset");
        }
    }
    Ok(engine)
}

fn load(
    engine: &MemoryEngine,
    table: &str,
    data: &serde_json::Value,
    geometry_field: &str,
    bbox: &BboxFields,
) -> Result<usize, CliError> {
    Ok(engine.load_geojson(table, data, geometry_field, bbox)?)
}

/// Execute a query on an engine.
pub async fn run(inputs: &Inputs, engine: Arc<dyn QueryEngine>, config: ServiceConfig) -> QueryResult {
    let service = ExecutionService::new(engine, config);
    service.execute_query(&inputs.query, &inputs.context).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const QUERY: &str = r#"{"find": "routes", "condition": "within", "distance": 300,
        "target": "selected_point", "blocks": [{"type": "exclude", "operator": "mode", "value": "Rail"}]}"#;

    const CONTEXT: &str = r#"{"serviceIdField": "service_id", "bboxReady": true,
        "bboxFields": {"minx": "minx", "miny": "miny", "maxx": "maxx", "maxy": "maxy"},
        "modeField": "mode", "geojsonField": "geojson", "point": {"lat": 55.9533, "lng": -3.1883}}"#;

    const ROUTES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"service_id": "26", "mode": "Bus"},
         "geometry": {"type": "LineString", "coordinates": [[-3.20, 55.9540], [-3.17, 55.9540]]}},
        {"type": "Feature", "properties": {"service_id": "ECML", "mode": "Rail"},
         "geometry": {"type": "Point", "coordinates": [-3.1883, 55.9530]}},
        {"type": "Feature", "properties": {"service_id": "44", "mode": "Bus"},
         "geometry": {"type": "Point", "coordinates": [-3.10, 55.90]}}
    ]}"#;

    #[test]
    fn test_parse_point() {
        let p = parse_point("55.9533, -3.1883").unwrap();
        assert_eq!(p, LatLng::new(55.9533, -3.1883));
        assert!(parse_point("55.9").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_load_inputs_with_point_override() {
        let dir = tempfile::tempdir().unwrap();
        let q = write(dir.path(), "q.json", QUERY);
        let c = write(dir.path(), "c.json", CONTEXT);

        let inputs = Inputs::load(&q, &c, Some("51.5,-0.12")).unwrap();
        assert_eq!(inputs.context.point, Some(LatLng::new(51.5, -0.12)));
        assert_eq!(inputs.query.blocks.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let c = write(dir.path(), "c.json", CONTEXT);
        let err = Inputs::load(&dir.path().join("nope.json"), &c, None).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_explain_bbox_with_post_filter() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs::load(
            &write(dir.path(), "q.json", QUERY),
            &write(dir.path(), "c.json", CONTEXT),
            None,
        )
        .unwrap();

        let explanation = explain(&inputs, &ServiceConfig::default()).unwrap();
        assert_eq!(explanation.tier, "bbox");
        assert!(explanation.post_filter);
        assert!(explanation.predicate.ends_with("AND NOT (\"mode\" = 'Rail'))"));
        assert!(explanation
            .statement
            .starts_with("SELECT DISTINCT \"service_id\", \"geojson\", \"mode\" FROM \"routes\" WHERE "));
        assert_eq!(
            explanation.description,
            "Find routes within 300m of the selected point, excluding mode = Rail"
        );
    }

    #[test]
    fn test_explain_without_geojson_skips_post_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Inputs::load(
            &write(dir.path(), "q.json", QUERY),
            &write(dir.path(), "c.json", CONTEXT),
            None,
        )
        .unwrap();
        inputs.context.geojson_field = None;

        let explanation = explain(&inputs, &ServiceConfig::default()).unwrap();
        assert_eq!(explanation.tier, "bbox");
        assert!(!explanation.post_filter);
        assert!(explanation
            .statement
            .starts_with("SELECT DISTINCT \"service_id\" FROM \"routes\" WHERE "));
    }

    #[tokio::test]
    async fn test_run_against_geojson_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs::load(
            &write(dir.path(), "q.json", QUERY),
            &write(dir.path(), "c.json", CONTEXT),
            None,
        )
        .unwrap();
        let routes = write(dir.path(), "routes.geojson", ROUTES);

        let config = ServiceConfig::default();
        let engine = memory_engine(Some(&routes), None, &inputs.context, &config).unwrap();
        assert_eq!(engine.row_count("routes"), 3);

        let result = run(&inputs, Arc::new(engine), config).await;
        assert!(result.success, "{:?}", result.message());
        assert_eq!(result.ids(), &["26"]);
    }

    #[test]
    fn test_compile_reports_validation() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs::load(
            &write(dir.path(), "q.json", r#"{"distance": -5}"#),
            &write(dir.path(), "c.json", CONTEXT),
            None,
        )
        .unwrap();
        let err = compile(&inputs).unwrap_err();
        assert!(err.to_string().contains("distance"));
    }
}

//! Query execution service.
//!
//! [`ExecutionService`] runs one query per call through a fixed sequence:
//! validate, compile (cached), build the predicate, query the engine, and
//! optionally refine bbox candidates with exact distances.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use routescope_core::row::{dedup_ids, row_id};
use routescope_core::{
    CacheKey, CacheStats, CompiledQueryCache, PostFilter, PredicateBuilder, Row, Tier,
};
use routescope_lang::{compile_query, query_hash, validate_query, CompileError};
use routescope_proto::{CompiledQuery, ExecutionContext, QueryResult, SpatialQuery};

use crate::config::ServiceConfig;
use crate::engine::{EngineConnection, EngineQuery, QueryEngine};
use crate::error::Error;

/// Stage of the call currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    Validating,
    Compiling,
    BuildingPredicate,
    Executing,
    PostFiltering,
    Completed,
    Failed,
}

/// Cooperative cancellation flag shared with one call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn same(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Executes spatial queries against a [`QueryEngine`].
///
/// The service tracks a single cancellation token: starting a call
/// replaces the tracked token, so [`cancel`](Self::cancel) only reaches
/// the most recently started call.
pub struct ExecutionService {
    engine: Arc<dyn QueryEngine>,
    config: ServiceConfig,
    cache: CompiledQueryCache,
    token: Mutex<Option<CancellationToken>>,
    phase: Mutex<ExecutionPhase>,
}

impl ExecutionService {
    /// Create a service over an engine.
    pub fn new(engine: Arc<dyn QueryEngine>, config: ServiceConfig) -> Self {
        let cache = CompiledQueryCache::new(config.cache_capacity);
        Self {
            engine,
            config,
            cache,
            token: Mutex::new(None),
            phase: Mutex::new(ExecutionPhase::Idle),
        }
    }

    /// Create a service with the default configuration.
    pub fn with_engine(engine: Arc<dyn QueryEngine>) -> Self {
        Self::new(engine, ServiceConfig::default())
    }

    /// Run a query and report the outcome in the result contract.
    ///
    /// Never fails: every error is folded into a `success: false` result.
    pub async fn execute_query(&self, query: &SpatialQuery, ctx: &ExecutionContext) -> QueryResult {
        let started = Instant::now();
        let outcome = self.try_execute(query, ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(ids) => {
                tracing::info!(count = ids.len(), elapsed_ms, find = query.find.as_str(), "query completed");
                QueryResult::success(ids)
            }
            Err(Error::Validation(errors)) => {
                tracing::debug!(violations = errors.len(), "query rejected");
                QueryResult::invalid(errors)
            }
            Err(e) => {
                tracing::warn!(error = %e, elapsed_ms, "query failed");
                e.into_result()
            }
        };
        self.set_phase(ExecutionPhase::Idle);
        result
    }

    /// Run a query, returning matching identifiers or the first error.
    pub async fn try_execute(
        &self,
        query: &SpatialQuery,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, Error> {
        let outcome = self.run(query, ctx).await;
        match &outcome {
            Ok(_) => self.set_phase(ExecutionPhase::Completed),
            Err(Error::Validation(_)) => self.set_phase(ExecutionPhase::Idle),
            Err(_) => self.set_phase(ExecutionPhase::Failed),
        }
        outcome
    }

    async fn run(&self, query: &SpatialQuery, ctx: &ExecutionContext) -> Result<Vec<String>, Error> {
        if ctx.service_id_field.is_none() {
            return Err(missing_id_field());
        }

        self.set_phase(ExecutionPhase::Validating);
        let errors = validate_query(query, ctx);
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        self.set_phase(ExecutionPhase::Compiling);
        let compiled = self.compile_cached(query, ctx)?;

        self.set_phase(ExecutionPhase::BuildingPredicate);
        let plan = ExecutionPlan::new(&compiled, ctx, &self.config)?;

        let token = self.begin();
        self.set_phase(ExecutionPhase::Executing);
        let rows = self.fetch(&plan.request, &token).await;
        self.finish(&token);
        let rows = rows?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match &plan.post_filter {
            Some(filter) => {
                self.set_phase(ExecutionPhase::PostFiltering);
                Ok(filter.apply(&rows))
            }
            None => Ok(dedup_ids(
                rows.iter().filter_map(|row| row_id(row, &plan.request.id_field)),
            )),
        }
    }

    /// One connection, one query, always closed.
    ///
    /// A call cancelled while the connection was being opened never
    /// reaches the engine.
    async fn fetch(&self, request: &EngineQuery, token: &CancellationToken) -> Result<Vec<Row>, Error> {
        let mut conn = self.engine.connect().await?;
        let outcome = if token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            self.query_with_timeout(conn.as_mut(), request).await
        };
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close engine connection");
        }
        outcome
    }

    async fn query_with_timeout(
        &self,
        conn: &mut dyn EngineConnection,
        request: &EngineQuery,
    ) -> Result<Vec<Row>, Error> {
        match self.config.execution_timeout {
            Some(limit) => tokio::time::timeout(limit, conn.query(request))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => conn.query(request).await,
        }
    }

    fn compile_cached(&self, query: &SpatialQuery, ctx: &ExecutionContext) -> Result<Arc<CompiledQuery>, Error> {
        let hash = query_hash(query).map_err(compile_error)?;
        let key = CacheKey::new(hash, ctx);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(hash = %key.hash, "compiled query cache hit");
            return Ok(hit);
        }
        let compiled = compile_query(query, ctx).map_err(compile_error)?;
        Ok(self.cache.insert(key, compiled))
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        // Replaces any token still held by an earlier call.
        *self.token.lock() = Some(token.clone());
        token
    }

    fn finish(&self, token: &CancellationToken) {
        let mut current = self.token.lock();
        if current.as_ref().is_some_and(|t| t.same(token)) {
            *current = None;
        }
    }

    /// Abort the most recently started call, if it is still running.
    pub fn cancel(&self) {
        if let Some(token) = self.token.lock().as_ref() {
            tracing::debug!("cancelling in-flight query");
            token.cancel();
        }
    }

    /// Drop every cached compiled query.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached compiled queries.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache hit/miss/eviction counters.
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Current execution phase.
    pub fn phase(&self) -> ExecutionPhase {
        *self.phase.lock()
    }

    /// The service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn set_phase(&self, phase: ExecutionPhase) {
        tracing::trace!(?phase, "execution phase");
        *self.phase.lock() = phase;
    }
}

/// How one compiled query runs: the tier, the engine request, and the
/// optional exact refinement of bbox candidates.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub tier: Tier,
    pub request: EngineQuery,
    pub post_filter: Option<PostFilter>,
}

impl ExecutionPlan {
    /// Plan a compiled query under a context.
    ///
    /// Candidates are refined when the bbox tier answers the query and
    /// per-row GeoJSON is available. The refinement re-evaluates the whole
    /// query with exact distances, so the request also projects every
    /// column that re-evaluation reads.
    pub fn new(compiled: &CompiledQuery, ctx: &ExecutionContext, config: &ServiceConfig) -> Result<Self, Error> {
        let id_field = ctx.service_id_field.as_deref().ok_or_else(missing_id_field)?;
        let builder = PredicateBuilder::new(ctx)?;
        let predicate = builder.build(compiled)?;
        let mut request = EngineQuery::new(config.table_for(compiled.find), id_field, predicate);

        let post_filter = match refinement_field(builder.tier(), ctx) {
            Some(field) => {
                let filter = PostFilter::new(builder.build_exact(compiled, field)?, id_field);
                request = request.with_geometry_field(field).with_columns(filter.columns());
                Some(filter)
            }
            None => None,
        };

        Ok(Self {
            tier: builder.tier(),
            request,
            post_filter,
        })
    }
}

fn refinement_field(tier: Tier, ctx: &ExecutionContext) -> Option<&str> {
    if tier == Tier::Native || !ctx.bbox_ready || ctx.point.is_none() {
        return None;
    }
    ctx.geojson_field.as_deref()
}

fn missing_id_field() -> Error {
    Error::Context("execution context has no serviceIdField to report matches by".into())
}

fn compile_error(e: CompileError) -> Error {
    match e {
        CompileError::Validation(v) => Error::Validation(v.messages),
        other => Error::Compile(other.to_string()),
    }
}

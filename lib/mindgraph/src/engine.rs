//! The engine facade: text in, results out, cache in between.

use crate::error::EngineError;
use crate::results::MaterializedResults;
use mindcache::{FileChangeEvent, IncrementalIndexer, QueryResultCache};
use mindstore::{MemoryTripleStore, StoreSnapshot};
use sparexec::{QueryEvaluator, QueryResults, QueryToken};
use sparir::{algebra, Optimizer, PredicateStats};
use sparlift::{LiftMetadata, VocabularyResolver, WellKnownVocabularies};
use sparsyn::ast;
use sparsyn::SparqlParser;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A parsed query: the syntax tree plus what the pre-parse rewrites
/// extracted from the text.
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub query: ast::Query,
    pub metadata: LiftMetadata,
}

/// Runs the pre-parse rewrites and the base parser (sync path).
///
/// `PREFIX *` needs vocabulary resolution and is rejected here; use
/// [`parse_async`].
pub fn parse(text: &str) -> Result<ParsedQuery, EngineError> {
    let (lifted, metadata) = sparlift::lift(text)?;
    let query = SparqlParser::new().parse_query(&lifted)?;
    Ok(ParsedQuery { query, metadata })
}

/// Runs the pre-parse rewrites with `PREFIX *` resolution, then the parser.
pub async fn parse_async(
    text: &str,
    resolver: &dyn VocabularyResolver,
) -> Result<ParsedQuery, EngineError> {
    let (lifted, metadata) = sparlift::lift_with_resolver(text, resolver).await?;
    let query = SparqlParser::new().parse_query(&lifted)?;
    Ok(ParsedQuery { query, metadata })
}

/// Lowers a parsed query into the algebra.
pub fn translate(parsed: &ParsedQuery) -> Result<algebra::Query, EngineError> {
    Ok(sparir::translate(&parsed.query, &parsed.metadata)?)
}

/// Optimizes an algebra tree, using store statistics when available.
pub fn optimize(query: algebra::Query, snapshot: &StoreSnapshot) -> algebra::Query {
    Optimizer::optimize(query, &SnapshotStats(snapshot))
}

/// Evaluates an algebra tree against a snapshot.
pub fn execute(
    query: &algebra::Query,
    snapshot: StoreSnapshot,
    token: QueryToken,
) -> Result<QueryResults, EngineError> {
    Ok(QueryEvaluator::new().execute(snapshot, query, token)?)
}

/// Reattaches the base directions the pre-parse rewrite stripped from
/// language-tagged literals in data blocks.
fn restore_quad_directions(quad: mindrdf::Quad, metadata: &LiftMetadata) -> mindrdf::Quad {
    use mindrdf::{Literal, Quad, Subject, Term, Triple};

    fn literal(literal: Literal, metadata: &LiftMetadata) -> Literal {
        if literal.direction().is_some() {
            return literal;
        }
        let Some(language) = literal.language() else {
            return literal;
        };
        let Some(direction) = metadata.directions.get(language) else {
            return literal;
        };
        Literal::new_directional_language_tagged_literal_unchecked(
            literal.value(),
            language.to_owned(),
            *direction,
        )
    }

    fn term(value: Term, metadata: &LiftMetadata) -> Term {
        match value {
            Term::Literal(l) => Term::Literal(literal(l, metadata)),
            Term::Triple(t) => Term::Triple(Box::new(triple(*t, metadata))),
            other => other,
        }
    }

    fn triple(value: Triple, metadata: &LiftMetadata) -> Triple {
        Triple {
            subject: match value.subject {
                Subject::Triple(t) => Subject::Triple(Box::new(triple(*t, metadata))),
                other => other,
            },
            predicate: value.predicate,
            object: term(value.object, metadata),
        }
    }

    Quad {
        subject: match quad.subject {
            Subject::Triple(t) => Subject::Triple(Box::new(triple(*t, metadata))),
            other => other,
        },
        predicate: quad.predicate,
        object: term(quad.object, metadata),
        graph_name: quad.graph_name,
    }
}

/// Predicate popularity sampled from the store, feeding BGP reordering.
struct SnapshotStats<'a>(&'a StoreSnapshot);

impl PredicateStats for SnapshotStats<'_> {
    fn predicate_count(&self, predicate: &mindrdf::NamedNode) -> usize {
        self.0.predicate_count(predicate)
    }
}

/// The full engine: store, pipeline, result cache and change indexer.
///
/// Queries are answered from the cache when a fresh entry exists; results
/// are stored with the contributing file paths the caller passes in, and
/// file-change events flow through the debounced indexer into targeted
/// invalidation.
pub struct GraphEngine {
    store: MemoryTripleStore,
    evaluator: QueryEvaluator,
    resolver: Arc<dyn VocabularyResolver>,
    cache: Arc<QueryResultCache<MaterializedResults>>,
    indexer: Arc<IncrementalIndexer>,
    timeout: Option<Duration>,
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::with_store(MemoryTripleStore::new())
    }
}

impl GraphEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine over an existing store.
    pub fn with_store(store: MemoryTripleStore) -> Self {
        let cache = Arc::new(QueryResultCache::new());
        let indexer = Arc::new(IncrementalIndexer::new());
        let hook = Arc::clone(&cache);
        indexer.on_change(move |event| {
            hook.invalidate_by_file(&event.path);
            if let Some(old_path) = &event.old_path {
                hook.invalidate_by_file(old_path);
            }
        });
        Self {
            store,
            evaluator: QueryEvaluator::new(),
            resolver: Arc::new(WellKnownVocabularies::new()),
            cache,
            indexer,
            timeout: None,
        }
    }

    /// Replaces the evaluator, carrying custom functions, aggregates or a
    /// `SERVICE` handler.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: QueryEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replaces the `PREFIX *` vocabulary resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn VocabularyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Applies a per-query evaluation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &MemoryTripleStore {
        &self.store
    }

    pub fn cache(&self) -> &QueryResultCache<MaterializedResults> {
        &self.cache
    }

    fn token(&self) -> QueryToken {
        match self.timeout {
            Some(timeout) => QueryToken::with_timeout(timeout),
            None => QueryToken::new(),
        }
    }

    /// Answers a query, reading through the cache. The result is not
    /// associated with any files; use [`GraphEngine::query_with_files`] for
    /// invalidation tracking.
    pub fn query(&self, text: &str) -> Result<MaterializedResults, EngineError> {
        self.query_with_files(text, &[])
    }

    /// Answers a query and records the files its result was derived from.
    pub fn query_with_files(
        &self,
        text: &str,
        files: &[String],
    ) -> Result<MaterializedResults, EngineError> {
        if let Some(hit) = self.cache.get(text) {
            debug!("answering query from cache");
            return Ok(hit);
        }
        let parsed = parse(text)?;
        let results = self.run(&parsed)?;
        self.cache.set(text, results.clone(), files);
        Ok(results)
    }

    /// The async query path, required for `PREFIX *` vocabulary imports.
    pub async fn query_async(&self, text: &str) -> Result<MaterializedResults, EngineError> {
        self.query_with_files_async(text, &[]).await
    }

    pub async fn query_with_files_async(
        &self,
        text: &str,
        files: &[String],
    ) -> Result<MaterializedResults, EngineError> {
        if let Some(hit) = self.cache.get(text) {
            debug!("answering query from cache");
            return Ok(hit);
        }
        let parsed = parse_async(text, self.resolver.as_ref()).await?;
        let results = self.run(&parsed)?;
        self.cache.set(text, results.clone(), files);
        Ok(results)
    }

    fn run(&self, parsed: &ParsedQuery) -> Result<MaterializedResults, EngineError> {
        let snapshot = self.store.snapshot();
        let translated = translate(parsed)?;
        let optimized = optimize(translated, &snapshot);
        let results = self.evaluator.execute(snapshot, &optimized, self.token())?;
        Ok(MaterializedResults::from_results(results)?)
    }

    /// Applies `INSERT DATA` / `DELETE DATA`; every other update form fails
    /// with [`EngineError::UnsupportedUpdate`]. Mutations drop the whole
    /// result cache.
    pub fn update(&self, text: &str) -> Result<(), EngineError> {
        // Updates go through the same pre-parse rewrites as queries, so
        // directional language tags and triple terms work in data blocks.
        let (lifted, metadata) = sparlift::lift(text)?;
        let update = SparqlParser::new().parse_update(&lifted)?;
        match update {
            ast::Update::InsertData(quads) => {
                let quads = quads
                    .into_iter()
                    .map(|quad| restore_quad_directions(quad, &metadata));
                let inserted = self.store.extend(quads)?;
                debug!(inserted, "applied INSERT DATA");
            }
            ast::Update::DeleteData(quads) => {
                let mut removed = 0_usize;
                for quad in quads {
                    if self
                        .store
                        .remove(&restore_quad_directions(quad, &metadata))
                    {
                        removed += 1;
                    }
                }
                debug!(removed, "applied DELETE DATA");
            }
        }
        self.cache.invalidate_all();
        Ok(())
    }

    /// Feeds a file-change event into the debounce window.
    pub fn on_file_change(&self, event: FileChangeEvent) {
        self.indexer.observe(event);
    }

    /// Feeds a file-change event and schedules a debounced flush on the
    /// current tokio runtime.
    pub fn on_file_change_debounced(&self, event: FileChangeEvent) {
        self.indexer.observe_debounced(event);
    }

    /// Drains all deferred changes, firing cache invalidation now.
    pub fn flush_changes(&self) {
        self.indexer.flush();
    }
}

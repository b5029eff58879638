//! Schema discovery.
//!
//! Finds the tables relevant to a question in five ordered phases:
//!
//! ```text
//! reconnaissance ─▶ table discovery ─▶ structural analysis
//!        ─▶ relationship discovery ─▶ sampling ─▶ bonus pass
//! ```
//!
//! Reconnaissance failures are fatal (unless tolerated by config). Every
//! later failure, a passed run deadline included, is contained to the
//! table it concerns: the table is logged and skipped or penalised, and
//! discovery continues. Only cancellation stops discovery mid-phase.

mod scorer;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::deadline::{CallError, CallGuard};
use crate::introspection::{DatabaseIntrospection, IntrospectionError};
use crate::model::{Intent, SchemaContext, TableCandidate, TableName};

pub use scorer::{
    bonus_adjustments, confidence, MatchTarget, RelevanceScore, RelevanceScorer, ScoreAdjustment,
};

/// Score weights used by discovery.
pub mod weights {
    /// Table name equals the search term.
    pub const TABLE_EXACT: f64 = 10.0;
    /// Table name contains the search term.
    pub const TABLE_PARTIAL: f64 = 7.0;
    /// Column name equals the search term.
    pub const COLUMN_EXACT: f64 = 5.0;
    /// Column name contains the search term.
    pub const COLUMN_PARTIAL: f64 = 3.0;
    /// The term is a high-value business term.
    pub const HIGH_VALUE_TERM: f64 = 2.0;
    /// A usage-like term in a top-N question.
    pub const TOP_N_USAGE: f64 = 3.0;
    /// Fixed score for tables found by the entity fallback.
    pub const ENTITY_FALLBACK: f64 = 3.0;

    pub const HAS_ROWS: f64 = 2.0;
    pub const USAGE_COLUMNS: f64 = 3.0;
    pub const USER_COLUMNS: f64 = 2.0;
    /// Per foreign key pointing at another relevant table.
    pub const RELATIONSHIP: f64 = 2.0;
    pub const LOOKUP_PENALTY: f64 = -1.0;
    pub const EMPTY_SAMPLE_PENALTY: f64 = -1.0;

    /// Tables with fewer rows than this (but some) look like lookups.
    pub const LOOKUP_ROW_LIMIT: i64 = 10;
    /// Score at which discovery confidence reaches 1.0.
    pub const CONFIDENCE_SCALE: f64 = 10.0;
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that end discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Schemas or tables could not be listed.
    #[error("schema reconnaissance failed: {0}")]
    Reconnaissance(String),

    #[error("run cancelled")]
    Cancelled,
}

/// Limits for one discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Cap on `relevant_tables` in the final context.
    pub max_tables: usize,
    /// Candidates kept after table discovery.
    pub search_limit: usize,
    /// Top candidates sampled.
    pub sample_tables: usize,
    /// Rows per sample.
    pub sample_rows: usize,
    pub tolerate_reconnaissance_failure: bool,
    pub default_schema: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_tables: 10,
            search_limit: 10,
            sample_tables: 5,
            sample_rows: 5,
            tolerate_reconnaissance_failure: false,
            default_schema: "dbo".to_string(),
        }
    }
}

/// What reconnaissance found.
#[derive(Debug, Default)]
struct Landscape {
    schemas: Vec<String>,
    tables: Vec<TableName>,
}

/// Candidate tables for one run, keyed by lowercase `schema.table`.
///
/// Candidates are only ever added to or adjusted, never replaced.
#[derive(Debug, Default)]
struct CandidateSet {
    tables: Vec<TableCandidate>,
    index: HashMap<String, usize>,
}

impl CandidateSet {
    fn entry(&mut self, name: &TableName) -> &mut TableCandidate {
        let key = name.key();
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.tables.push(TableCandidate::new(name.clone(), 0.0));
                let idx = self.tables.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };
        &mut self.tables[idx]
    }

    fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn keys(&self) -> BTreeSet<String> {
        self.index.keys().cloned().collect()
    }

    /// Re-sort by score, highest first; ties by name for determinism.
    fn rank(&mut self) {
        self.tables.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.name.key().cmp(&b.name.key()))
        });
        self.reindex();
    }

    fn truncate(&mut self, len: usize) {
        self.tables.truncate(len);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.key(), i))
            .collect();
    }

    fn into_tables(self) -> Vec<TableCandidate> {
        self.tables
    }
}

/// Runs the discovery phases against a database.
pub struct SchemaDiscoveryEngine {
    db: Arc<dyn DatabaseIntrospection>,
    scorer: RelevanceScorer,
    config: DiscoveryConfig,
}

impl SchemaDiscoveryEngine {
    pub fn new(db: Arc<dyn DatabaseIntrospection>, config: DiscoveryConfig) -> Self {
        Self {
            db,
            scorer: RelevanceScorer::new(),
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover the tables relevant to `intent`.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Reconnaissance`] when schemas or tables cannot be
    /// listed and failures are not tolerated, and
    /// [`DiscoveryError::Cancelled`] when the run is cancelled.
    pub async fn discover(
        &self,
        intent: &Intent,
        guard: &CallGuard,
    ) -> DiscoveryResult<SchemaContext> {
        let landscape = self.reconnaissance(guard).await?;
        info!(
            schemas = landscape.schemas.len(),
            tables = landscape.tables.len(),
            "reconnaissance complete"
        );

        let mut candidates = self.discover_tables(intent, &landscape, guard).await?;
        info!(candidates = candidates.tables.len(), "table discovery complete");

        self.analyze_structure(&mut candidates, guard).await?;
        self.discover_relationships(&mut candidates, guard).await?;
        self.sample(&mut candidates, guard).await?;

        for candidate in &mut candidates.tables {
            let bonus = bonus_adjustments(candidate);
            if !bonus.adjustments.is_empty() {
                debug!(table = %candidate.name, delta = bonus.total, "bonus pass");
            }
            candidate.relevance_score += bonus.total;
        }
        candidates.rank();
        candidates.truncate(self.config.max_tables);

        let relevant_tables = candidates.into_tables();
        let confidence_score = confidence(relevant_tables.first().map(|t| t.relevance_score));
        info!(
            relevant = relevant_tables.len(),
            confidence = confidence_score,
            "schema discovery complete"
        );

        Ok(SchemaContext {
            relevant_tables,
            schemas_explored: landscape.schemas,
            search_terms: intent.search_terms.clone(),
            confidence_score,
        })
    }

    /// Phase 1: list schemas and tables.
    async fn reconnaissance(&self, guard: &CallGuard) -> DiscoveryResult<Landscape> {
        let listed = async {
            let schemas = guard.call(self.db.list_schemas()).await?;
            let tables = guard.call(self.db.list_tables()).await?;
            Ok::<_, CallError<IntrospectionError>>(Landscape { schemas, tables })
        }
        .await;

        match listed {
            Ok(landscape) => Ok(landscape),
            Err(CallError::Cancelled) => Err(DiscoveryError::Cancelled),
            Err(e) if self.config.tolerate_reconnaissance_failure => {
                warn!(error = %e, "reconnaissance failed; continuing with an empty schema");
                Ok(Landscape::default())
            }
            Err(e) => Err(DiscoveryError::Reconnaissance(e.to_string())),
        }
    }

    /// Phase 2: search each term and accumulate scores per table.
    async fn discover_tables(
        &self,
        intent: &Intent,
        landscape: &Landscape,
        guard: &CallGuard,
    ) -> DiscoveryResult<CandidateSet> {
        let mut candidates = CandidateSet::default();
        let mut seen_terms = BTreeSet::new();

        for term in &intent.search_terms {
            let term = term.trim();
            if term.is_empty() || !seen_terms.insert(term.to_lowercase()) {
                continue;
            }

            let matches = match guard.call(self.db.search_schema(term)).await {
                Ok(matches) => matches,
                Err(CallError::Cancelled) => return Err(DiscoveryError::Cancelled),
                Err(e) => {
                    warn!(term, error = %e, "schema search failed; skipping term");
                    continue;
                }
            };

            for hit in matches {
                let target = MatchTarget {
                    table_name: &hit.table.table,
                    column_name: hit.column.as_deref(),
                };
                let score = self.scorer.score(term, target, intent);
                candidates.entry(&hit.table).relevance_score += score;
            }
        }

        if candidates.is_empty() {
            self.entity_fallback(intent, landscape, &mut candidates);
        }

        if candidates.is_empty() {
            debug!("no search or entity matches; seeding every listed table");
            for table in landscape.tables.iter().take(self.config.search_limit) {
                candidates.entry(table);
            }
        }

        candidates.rank();
        candidates.truncate(self.config.search_limit);
        Ok(candidates)
    }

    /// Substring-match entities against table names at a fixed low score.
    fn entity_fallback(
        &self,
        intent: &Intent,
        landscape: &Landscape,
        candidates: &mut CandidateSet,
    ) {
        let entities: Vec<String> = intent
            .entities
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        for table in &landscape.tables {
            let name = table.table.to_lowercase();
            if entities.iter().any(|e| name.contains(e.as_str())) {
                candidates.entry(table).relevance_score = weights::ENTITY_FALLBACK;
            }
        }
        debug!(found = candidates.tables.len(), "entity fallback");
    }

    /// Phase 3: columns and statistics per candidate.
    async fn analyze_structure(
        &self,
        candidates: &mut CandidateSet,
        guard: &CallGuard,
    ) -> DiscoveryResult<()> {
        for candidate in &mut candidates.tables {
            let described = async {
                let columns = guard.call(self.db.describe_table(&candidate.name)).await?;
                let stats = guard.call(self.db.get_stats(&candidate.name)).await?;
                Ok::<_, CallError<IntrospectionError>>((columns, stats))
            }
            .await;

            match described {
                Ok((columns, stats)) => {
                    candidate.columns = columns;
                    candidate.stats = stats;
                    candidate.analyzed = true;
                }
                Err(CallError::Cancelled) => return Err(DiscoveryError::Cancelled),
                Err(e) => {
                    warn!(
                        table = %candidate.name,
                        error = %e,
                        "structural analysis failed; skipping table"
                    );
                }
            }
        }
        candidates.rank();
        Ok(())
    }

    /// Phase 4: foreign keys, and the bonus for links between candidates.
    async fn discover_relationships(
        &self,
        candidates: &mut CandidateSet,
        guard: &CallGuard,
    ) -> DiscoveryResult<()> {
        let relevant = candidates.keys();

        for candidate in candidates.tables.iter_mut().filter(|c| c.analyzed) {
            match guard.call(self.db.get_foreign_keys(&candidate.name)).await {
                Ok(foreign_keys) => candidate.foreign_keys = foreign_keys,
                Err(CallError::Cancelled) => return Err(DiscoveryError::Cancelled),
                Err(e) => {
                    warn!(table = %candidate.name, error = %e, "foreign key lookup failed");
                    continue;
                }
            }

            if candidate.relationship_bonus_applied {
                continue;
            }
            let own_key = candidate.name.key();
            let links = candidate
                .foreign_keys
                .iter()
                .map(|fk| fk.referenced_table.key())
                .filter(|key| *key != own_key && relevant.contains(key))
                .count();
            if links > 0 {
                candidate.relevance_score += weights::RELATIONSHIP * links as f64;
                candidate.relationship_bonus_applied = true;
                debug!(table = %candidate.name, links, "relationship bonus");
            }
        }
        candidates.rank();
        Ok(())
    }

    /// Phase 5: sample the top candidates.
    async fn sample(
        &self,
        candidates: &mut CandidateSet,
        guard: &CallGuard,
    ) -> DiscoveryResult<()> {
        let limit = self.config.sample_rows;
        let to_sample = self.config.sample_tables;

        for candidate in candidates
            .tables
            .iter_mut()
            .filter(|c| c.analyzed)
            .take(to_sample)
        {
            match guard.call(self.db.sample_rows(&candidate.name, limit)).await {
                Ok(rows) => candidate.sample_rows = rows,
                Err(CallError::Cancelled) => return Err(DiscoveryError::Cancelled),
                Err(e) => {
                    warn!(table = %candidate.name, error = %e, "sampling failed");
                }
            }
            if candidate.sample_rows.is_empty() {
                candidate.relevance_score += weights::EMPTY_SAMPLE_PENALTY;
            }
        }
        candidates.rank();
        Ok(())
    }
}

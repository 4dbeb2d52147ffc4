//! Data model shared by the engine, the query parser, and the graph index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A heading found in a note, with its nesting level and rough size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// 1..=6, mirroring Markdown heading depth.
    pub level: u8,
    pub word_count: usize,
}

/// The unit indexed by the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique, stable identifier. Carried from frontmatter when present,
    /// otherwise derived from `path`.
    pub stem: String,
    pub title: String,
    /// Notebook-relative, forward-slash path.
    pub path: String,
    /// First-seen order preserved; deduplicated case-insensitively on read.
    pub tags: Vec<String>,
    pub sections: Vec<Section>,
    /// Stems this note references. Never contains `stem` itself.
    pub links_out: Vec<String>,
    /// Content hash used for delta-refresh dirty detection.
    pub fingerprint: String,
}

impl Note {
    pub fn word_count(&self) -> usize {
        self.sections.iter().map(|s| s.word_count).sum()
    }

    pub fn best_section(&self) -> Option<&Section> {
        self.sections.iter().max_by_key(|s| s.word_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// A traversal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub stem: String,
    pub direction: Direction,
    pub distance: u32,
    pub title: String,
    pub path: String,
}

/// Read-only projection of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkGraphMetadata {
    pub stem: String,
    pub title: String,
    pub path: String,
    pub tags: Vec<String>,
}

impl From<&Note> for LinkGraphMetadata {
    fn from(note: &Note) -> Self {
        Self {
            stem: note.stem.clone(),
            title: note.title.clone(),
            path: note.path.clone(),
            tags: note.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub stem: String,
    pub score: f64,
    pub title: String,
    pub path: String,
    pub best_section: Option<String>,
    /// `+`-joined tokens naming which signals fired, e.g. `path_fuzzy+section_heading_contains`.
    pub match_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Fts,
    Exact,
    PathFuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortTerm {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocScope {
    SectionOnly,
    Doc,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgraphMode {
    /// Random walks may leave the k-hop subgraph.
    Unrestricted,
    /// Random walks are restricted to the k-hop subgraph around the seed.
    Force,
}

/// Personalized PageRank knobs for `related:` filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PprOptions {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub subgraph_mode: SubgraphMode,
}

impl Default for PprOptions {
    fn default() -> Self {
        Self {
            alpha: 0.85,
            max_iter: 50,
            tol: 1e-6,
            subgraph_mode: SubgraphMode::Unrestricted,
        }
    }
}

/// A `related:<stem>` filter, with its bounded-distance and optional PPR knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedFilter {
    pub seed: String,
    pub max_distance: u32,
    pub ppr: Option<PprOptions>,
}

/// Structured filters parsed out of operator syntax or supplied directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub tags_any: Vec<String>,
    pub tags_not: Vec<String>,
    pub link_to: Vec<String>,
    pub linked_by: Vec<String>,
    pub related: Vec<RelatedFilter>,
    pub doc_scope: Option<DocScope>,
    pub max_heading_level: Option<u8>,
    pub max_tree_hops: Option<u32>,
    pub collapse_to_doc: bool,
    pub edge_types: Option<Vec<String>>,
    pub per_doc_section_cap: Option<usize>,
    pub min_section_words: Option<usize>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.tags_any.is_empty()
            && self.tags_not.is_empty()
            && self.link_to.is_empty()
            && self.linked_by.is_empty()
            && self.related.is_empty()
    }
}

/// The normalized, effective query after the engine parses operator syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub query_text: String,
    pub match_strategy: MatchStrategy,
    pub case_sensitive: bool,
    pub sort_terms: Vec<SortTerm>,
    pub filters: Filters,
}

impl Default for SearchPlan {
    fn default() -> Self {
        Self {
            query_text: String::new(),
            match_strategy: MatchStrategy::Fts,
            case_sensitive: false,
            sort_terms: vec![SortTerm {
                field: "score".to_string(),
                order: SortOrder::Desc,
            }],
            filters: Filters::default(),
        }
    }
}

/// Caller-supplied overrides layered onto the parsed plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub match_strategy: Option<MatchStrategy>,
    pub case_sensitive: Option<bool>,
    pub sort_terms: Option<Vec<SortTerm>>,
    pub filters: Option<Filters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub lead: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphStats {
    pub total_notes: usize,
    pub orphans: usize,
    pub links_in_graph: usize,
    pub nodes_in_graph: usize,
}

/// `(phase, duration_ms, success, extra)`, emitted by engine and backend operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub success: bool,
    pub extra: Value,
}

impl PhaseRecord {
    pub fn new(phase: impl Into<String>, duration_ms: u64, success: bool, extra: Value) -> Self {
        Self {
            phase: phase.into(),
            duration_ms,
            success,
            extra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    Noop,
    Full,
    Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub mode: RefreshMode,
    pub changed_count: usize,
    pub force_full: bool,
    pub fallback: bool,
    pub events: Vec<PhaseRecord>,
}

//! The Link-Graph Engine: notebook index, hybrid search, traversal,
//! metadata/TOC/stats, and incremental-or-full refresh.
//!
//! Organized per the arena-of-indices redesign: notes live in a dense
//! `Vec`, looked up by stem through a side `HashMap`, with forward/reverse
//! adjacency as parallel `Vec<Vec<NoteIdx>>`. BFS and PageRank both walk
//! indices, never stems, once a query enters the traversal path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{LinkGraphError, Result};
use crate::model::{
    Direction, Filters, GraphStats, LinkGraphMetadata, MatchStrategy, Neighbor, PhaseRecord,
    RefreshMode, RefreshResult, SearchHit, SearchOptions, SearchPlan, SortOrder, SubgraphMode,
    TocEntry,
};
use crate::query_parser;
use crate::scan::{self, NoteRecord, ScanConfig};
use crate::text_index::{self, DocFrequencies};

type NoteIdx = usize;

const W_FTS: f64 = 1.0;
const W_PATH: f64 = 0.6;
const W_SECTION: f64 = 0.4;
const W_GRAPH: f64 = 0.3;

/// The effective plan and ranked results of a [`LinkGraphEngine::search_planned`] call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub effective_query: String,
    pub effective_options: SearchPlan,
    pub hits: Vec<SearchHit>,
}

/// In-memory note graph, its derived indices, and the scan policy used to
/// (re)build them.
pub struct LinkGraphEngine {
    scan_config: ScanConfig,
    records: HashMap<String, NoteRecord>,
    arena: Vec<String>,
    by_stem: HashMap<String, NoteIdx>,
    forward: Vec<Vec<NoteIdx>>,
    reverse: Vec<Vec<NoteIdx>>,
    doc_freq: DocFrequencies,
    initialized: bool,
}

impl LinkGraphEngine {
    /// Construct an engine bound to `scan_config` but not yet indexed.
    /// Callers must call [`LinkGraphEngine::refresh_plan_apply`] with
    /// `force_full = true` (or otherwise populate the index) before any
    /// other operation will succeed.
    pub fn new(scan_config: ScanConfig) -> Self {
        Self {
            scan_config,
            records: HashMap::new(),
            arena: Vec::new(),
            by_stem: HashMap::new(),
            forward: Vec::new(),
            reverse: Vec::new(),
            doc_freq: DocFrequencies::default(),
            initialized: false,
        }
    }

    fn require_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(LinkGraphError::EngineUnavailable)
        }
    }

    // ---- search -----------------------------------------------------

    pub fn search_planned(&self, query: &str, limit: usize, options: SearchOptions) -> Result<SearchOutcome> {
        self.require_initialized()?;
        if limit == 0 {
            return Err(LinkGraphError::InvalidOption("limit must be positive".to_string()));
        }

        let mut plan = query_parser::parse(query);
        if let Some(strategy) = options.match_strategy {
            plan.match_strategy = strategy;
        }
        if let Some(case_sensitive) = options.case_sensitive {
            plan.case_sensitive = case_sensitive;
        }
        if let Some(sort_terms) = options.sort_terms {
            plan.sort_terms = sort_terms;
        }
        if let Some(filters) = options.filters {
            plan.filters = filters;
        }
        query_parser::validate_plan(&plan)?;

        let candidates = self.candidate_set(&plan.filters)?;
        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|idx| self.score_note(idx, &plan))
            .collect();

        self.sort_hits(&mut hits, &plan.sort_terms);
        hits.truncate(limit);

        Ok(SearchOutcome {
            effective_query: plan.query_text.clone(),
            effective_options: plan,
            hits,
        })
    }

    /// Notes surviving the structural filters (tags, link_to/linked_by,
    /// related seeds). An empty `Filters` keeps every indexed note.
    fn candidate_set(&self, filters: &Filters) -> Result<Vec<NoteIdx>> {
        let mut idxs: HashSet<NoteIdx> = (0..self.arena.len()).collect();

        if !filters.tags_any.is_empty() {
            let wanted: HashSet<String> = filters.tags_any.iter().map(|t| t.to_lowercase()).collect();
            idxs.retain(|&i| {
                let note = &self.records[&self.arena[i]].note;
                note.tags.iter().any(|t| wanted.contains(&t.to_lowercase()))
            });
        }
        if !filters.tags_not.is_empty() {
            let excluded: HashSet<String> = filters.tags_not.iter().map(|t| t.to_lowercase()).collect();
            idxs.retain(|&i| {
                let note = &self.records[&self.arena[i]].note;
                !note.tags.iter().any(|t| excluded.contains(&t.to_lowercase()))
            });
        }
        if !filters.link_to.is_empty() {
            let seeds: Vec<NoteIdx> = filters.link_to.iter().filter_map(|s| self.by_stem.get(s).copied()).collect();
            idxs.retain(|&i| seeds.iter().any(|&s| self.forward[s].contains(&i)));
        }
        if !filters.linked_by.is_empty() {
            let seeds: Vec<NoteIdx> = filters.linked_by.iter().filter_map(|s| self.by_stem.get(s).copied()).collect();
            idxs.retain(|&i| seeds.iter().any(|&s| self.reverse[s].contains(&i)));
        }
        for related in &filters.related {
            let Some(&seed_idx) = self.by_stem.get(&related.seed) else {
                idxs.clear();
                break;
            };
            let reachable = self.bounded_undirected(seed_idx, related.max_distance);
            let reachable_set: HashSet<NoteIdx> = reachable.into_iter().map(|(idx, _)| idx).collect();
            idxs.retain(|i| reachable_set.contains(i));
        }

        Ok(idxs.into_iter().collect())
    }

    fn score_note(&self, idx: NoteIdx, plan: &SearchPlan) -> SearchHit {
        let record = &self.records[&self.arena[idx]];
        let note = &record.note;
        let mut reasons: Vec<&'static str> = Vec::new();
        let mut score = 0.0;

        if !plan.query_text.is_empty() {
            match plan.match_strategy {
                MatchStrategy::Fts => {
                    let query_tokens = text_index::tokenize(&plan.query_text);
                    let fts = text_index::bm25_score(&query_tokens, &record.body_tokens, &self.doc_freq);
                    if fts > 0.0 {
                        score += W_FTS * fts;
                        reasons.push("fts");
                    }
                    let path_score = text_index::path_fuzzy_score(&plan.query_text, &note.path);
                    if path_score > 0.0 {
                        score += W_PATH * path_score;
                        reasons.push("path_fuzzy");
                    }
                }
                MatchStrategy::PathFuzzy => {
                    let path_score = text_index::path_fuzzy_score(&plan.query_text, &note.path);
                    if path_score > 0.0 {
                        score += W_PATH * path_score;
                        reasons.push("path_fuzzy");
                    }
                }
                MatchStrategy::Exact => {
                    let q = if plan.case_sensitive {
                        plan.query_text.clone()
                    } else {
                        plan.query_text.to_lowercase()
                    };
                    let hay = if plan.case_sensitive {
                        format!("{} {}", note.title, note.path)
                    } else {
                        format!("{} {}", note.title.to_lowercase(), note.path.to_lowercase())
                    };
                    if !q.is_empty() && hay.contains(&q) {
                        score += W_FTS;
                        reasons.push("exact");
                    }
                }
            }
        }

        let best_section = note.best_section().map(|s| s.heading.clone());
        if !plan.query_text.is_empty() {
            if let Some(section) = note.best_section() {
                let heading_lower = section.heading.to_lowercase();
                let max_level = plan.filters.max_heading_level.unwrap_or(6);
                if section.level <= max_level && heading_lower.contains(&plan.query_text.to_lowercase()) {
                    let depth_penalty = 1.0 / section.level as f64;
                    score += W_SECTION * depth_penalty;
                    reasons.push("section_heading_contains");
                }
            }
        }

        let graph_bonus = self.graph_proximity(idx, &plan.filters);
        if graph_bonus > 0.0 {
            score += W_GRAPH * graph_bonus;
            reasons.push("graph_proximity");
        }

        SearchHit {
            stem: note.stem.clone(),
            score: score.max(0.0),
            title: note.title.clone(),
            path: note.path.clone(),
            best_section,
            match_reason: if reasons.is_empty() {
                None
            } else {
                Some(reasons.join("+"))
            },
        }
    }

    /// Bonus for notes near a `related:`/`link_to:`/`linked_by:` seed or
    /// sharing tags named by `tags_any`, decaying with graph distance.
    fn graph_proximity(&self, idx: NoteIdx, filters: &Filters) -> f64 {
        let mut bonus = 0.0;

        for related in &filters.related {
            if let Some(&seed_idx) = self.by_stem.get(&related.seed) {
                if let Some(ppr) = &related.ppr {
                    let scores = self.personalized_pagerank(seed_idx, ppr, related.max_distance);
                    bonus += scores.get(&idx).copied().unwrap_or(0.0);
                } else {
                    for (reached, distance) in self.bounded_undirected(seed_idx, related.max_distance) {
                        if reached == idx {
                            bonus += 1.0 / (1.0 + distance as f64);
                        }
                    }
                }
            }
        }

        for seed in filters.link_to.iter().chain(filters.linked_by.iter()) {
            if let Some(&seed_idx) = self.by_stem.get(seed) {
                if self.forward[seed_idx].contains(&idx) || self.reverse[seed_idx].contains(&idx) {
                    bonus += 1.0;
                }
            }
        }

        if !filters.tags_any.is_empty() {
            let note = &self.records[&self.arena[idx]].note;
            let wanted: HashSet<String> = filters.tags_any.iter().map(|t| t.to_lowercase()).collect();
            let shared = note.tags.iter().filter(|t| wanted.contains(&t.to_lowercase())).count();
            if shared > 0 {
                bonus += shared as f64 / filters.tags_any.len() as f64;
            }
        }

        bonus
    }

    fn sort_hits(&self, hits: &mut [SearchHit], sort_terms: &[crate::model::SortTerm]) {
        hits.sort_by(|a, b| {
            for term in sort_terms {
                let ordering = match term.field.as_str() {
                    "score" => a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal),
                    "path" => a.path.cmp(&b.path),
                    "stem" => a.stem.cmp(&b.stem),
                    "title" => a.title.cmp(&b.title),
                    _ => std::cmp::Ordering::Equal,
                };
                let ordering = match term.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            a.path.cmp(&b.path).then_with(|| a.stem.cmp(&b.stem))
        });
    }

    // ---- traversal ----------------------------------------------------

    pub fn neighbors(&self, stem: &str, direction: Direction, hops: u32, limit: usize) -> Result<Vec<Neighbor>> {
        self.require_initialized()?;
        if hops == 0 {
            return Err(LinkGraphError::InvalidOption("hops must be >= 1".to_string()));
        }
        let Some(&start) = self.by_stem.get(stem) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Neighbor> = match direction {
            Direction::Outgoing => self
                .bfs_directed(&self.forward, start, hops)
                .into_iter()
                .map(|(idx, dist)| self.to_neighbor(idx, Direction::Outgoing, dist))
                .collect(),
            Direction::Incoming => self
                .bfs_directed(&self.reverse, start, hops)
                .into_iter()
                .map(|(idx, dist)| self.to_neighbor(idx, Direction::Incoming, dist))
                .collect(),
            Direction::Both => {
                let undirected = self.bounded_undirected(start, hops);
                let fwd_reachable: HashSet<NoteIdx> =
                    self.bfs_directed(&self.forward, start, hops).into_iter().map(|(i, _)| i).collect();
                let rev_reachable: HashSet<NoteIdx> =
                    self.bfs_directed(&self.reverse, start, hops).into_iter().map(|(i, _)| i).collect();

                undirected
                    .into_iter()
                    .map(|(idx, dist)| {
                        let direction = match (fwd_reachable.contains(&idx), rev_reachable.contains(&idx)) {
                            (true, false) => Direction::Outgoing,
                            (false, true) => Direction::Incoming,
                            _ => Direction::Both,
                        };
                        self.to_neighbor(idx, direction, dist)
                    })
                    .collect()
            }
        };

        results.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.stem.cmp(&b.stem)));
        results.truncate(limit);
        Ok(results)
    }

    pub fn related(&self, stem: &str, max_distance: u32, limit: usize) -> Result<Vec<Neighbor>> {
        self.require_initialized()?;
        if max_distance == 0 {
            return Err(LinkGraphError::InvalidOption("max_distance must be >= 1".to_string()));
        }
        let Some(&start) = self.by_stem.get(stem) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Neighbor> = self
            .bounded_undirected(start, max_distance)
            .into_iter()
            .map(|(idx, dist)| self.to_neighbor(idx, Direction::Both, dist))
            .collect();

        results.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.stem.cmp(&b.stem)));
        results.truncate(limit);
        Ok(results)
    }

    fn to_neighbor(&self, idx: NoteIdx, direction: Direction, distance: u32) -> Neighbor {
        let note = &self.records[&self.arena[idx]].note;
        Neighbor {
            stem: note.stem.clone(),
            direction,
            distance,
            title: note.title.clone(),
            path: note.path.clone(),
        }
    }

    fn bfs_directed(&self, adjacency: &[Vec<NoteIdx>], start: NoteIdx, hops: u32) -> Vec<(NoteIdx, u32)> {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut frontier = VecDeque::new();
        frontier.push_back((start, 0u32));
        let mut out = Vec::new();

        while let Some((node, dist)) = frontier.pop_front() {
            if dist >= hops {
                continue;
            }
            for &next in &adjacency[node] {
                if visited.insert(next) {
                    out.push((next, dist + 1));
                    frontier.push_back((next, dist + 1));
                }
            }
        }
        out
    }

    fn bounded_undirected(&self, start: NoteIdx, max_distance: u32) -> Vec<(NoteIdx, u32)> {
        let mut visited = HashMap::new();
        visited.insert(start, 0u32);
        let mut frontier = VecDeque::new();
        frontier.push_back(start);

        while let Some(node) = frontier.pop_front() {
            let dist = visited[&node];
            if dist >= max_distance {
                continue;
            }
            let neighbors = self.forward[node].iter().chain(self.reverse[node].iter());
            for &next in neighbors {
                if !visited.contains_key(&next) {
                    visited.insert(next, dist + 1);
                    frontier.push_back(next);
                }
            }
        }

        visited.remove(&start);
        visited.into_iter().collect()
    }

    /// Personalized PageRank seeded at `seed`, restricted to the k-hop
    /// subgraph when `ppr.subgraph_mode == Force`.
    fn personalized_pagerank(
        &self,
        seed: NoteIdx,
        ppr: &crate::model::PprOptions,
        max_distance: u32,
    ) -> HashMap<NoteIdx, f64> {
        let universe: Vec<NoteIdx> = match ppr.subgraph_mode {
            SubgraphMode::Force => {
                let mut nodes: Vec<NoteIdx> = self
                    .bounded_undirected(seed, max_distance)
                    .into_iter()
                    .map(|(idx, _)| idx)
                    .collect();
                nodes.push(seed);
                nodes
            }
            SubgraphMode::Unrestricted => (0..self.arena.len()).collect(),
        };
        let allowed: HashSet<NoteIdx> = universe.iter().copied().collect();

        let mut p: HashMap<NoteIdx, f64> = universe.iter().map(|&i| (i, 0.0)).collect();
        *p.entry(seed).or_insert(0.0) = 1.0;

        for _ in 0..ppr.max_iter {
            let mut next: HashMap<NoteIdx, f64> = universe.iter().map(|&i| (i, 0.0)).collect();
            for &node in &universe {
                let out_edges: Vec<NoteIdx> = self.forward[node]
                    .iter()
                    .copied()
                    .filter(|n| allowed.contains(n))
                    .collect();
                let mass = p.get(&node).copied().unwrap_or(0.0);
                if out_edges.is_empty() {
                    continue;
                }
                let share = (1.0 - ppr.alpha) * mass / out_edges.len() as f64;
                for target in out_edges {
                    *next.entry(target).or_insert(0.0) += share;
                }
            }
            *next.entry(seed).or_insert(0.0) += ppr.alpha;

            let delta: f64 = universe
                .iter()
                .map(|i| (next.get(i).copied().unwrap_or(0.0) - p.get(i).copied().unwrap_or(0.0)).abs())
                .sum();
            p = next;
            if delta <= ppr.tol {
                break;
            }
        }

        p.remove(&seed);
        p
    }

    // ---- metadata / toc / stats ---------------------------------------

    pub fn metadata(&self, stem: &str) -> Result<Option<LinkGraphMetadata>> {
        self.require_initialized()?;
        Ok(self.records.get(stem).map(|r| LinkGraphMetadata::from(&r.note)))
    }

    pub fn toc(&self, limit: usize) -> Result<Vec<TocEntry>> {
        self.require_initialized()?;
        let mut entries: Vec<TocEntry> = self
            .arena
            .iter()
            .map(|stem| {
                let record = &self.records[stem];
                TocEntry {
                    id: record.note.stem.clone(),
                    title: record.note.title.clone(),
                    tags: record.note.tags.clone(),
                    lead: record.lead.clone(),
                    path: record.note.path.clone(),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn stats(&self) -> Result<GraphStats> {
        self.require_initialized()?;
        let total_notes = self.arena.len();
        let mut orphans = 0;
        let mut links_in_graph = 0;
        for idx in 0..total_notes {
            let degree = self.forward[idx].len() + self.reverse[idx].len();
            if degree == 0 {
                orphans += 1;
            }
            links_in_graph += self.forward[idx].len();
        }
        Ok(GraphStats {
            total_notes,
            orphans,
            links_in_graph,
            nodes_in_graph: total_notes.saturating_sub(orphans),
        })
    }

    // ---- refresh --------------------------------------------------------

    pub fn refresh_plan_apply(
        &mut self,
        changed_paths: &[String],
        force_full: bool,
        full_rebuild_threshold: usize,
    ) -> Result<RefreshResult> {
        let mut events = Vec::new();

        if force_full {
            return self.do_full(changed_paths.len(), false, &mut events, "force_full");
        }
        if changed_paths.is_empty() {
            let t0 = Instant::now();
            events.push(PhaseRecord::new("plan", elapsed_ms(t0), true, json!({ "reason": "noop" })));
            return Ok(RefreshResult {
                mode: RefreshMode::Noop,
                changed_count: 0,
                force_full: false,
                fallback: false,
                events,
            });
        }
        if changed_paths.len() >= full_rebuild_threshold {
            return self.do_full(changed_paths.len(), false, &mut events, "threshold_exceeded");
        }

        let t0 = Instant::now();
        let delta_result = self.apply_delta(changed_paths);
        events.push(PhaseRecord::new(
            "delta.apply",
            elapsed_ms(t0),
            delta_result.is_ok(),
            json!({ "changed_count": changed_paths.len() }),
        ));

        match delta_result {
            Ok(()) => Ok(RefreshResult {
                mode: RefreshMode::Delta,
                changed_count: changed_paths.len(),
                force_full: false,
                fallback: false,
                events,
            }),
            Err(e) => {
                warn!(error = %e, "delta refresh failed, falling back to full rebuild");
                let t1 = Instant::now();
                let rebuild = self.full_rebuild();
                events.push(PhaseRecord::new(
                    "rebuild.full",
                    elapsed_ms(t1),
                    rebuild.is_ok(),
                    json!({ "reason": "delta_fallback" }),
                ));
                rebuild?;
                Ok(RefreshResult {
                    mode: RefreshMode::Full,
                    changed_count: changed_paths.len(),
                    force_full: false,
                    fallback: true,
                    events,
                })
            }
        }
    }

    fn do_full(
        &mut self,
        changed_count: usize,
        fallback: bool,
        events: &mut Vec<PhaseRecord>,
        reason: &str,
    ) -> Result<RefreshResult> {
        let t0 = Instant::now();
        let result = self.full_rebuild();
        events.push(PhaseRecord::new(
            "rebuild.full",
            elapsed_ms(t0),
            result.is_ok(),
            json!({ "reason": reason }),
        ));
        result?;
        Ok(RefreshResult {
            mode: RefreshMode::Full,
            changed_count,
            force_full: reason == "force_full",
            fallback,
            events: std::mem::take(events),
        })
    }

    fn full_rebuild(&mut self) -> Result<()> {
        let records = scan::scan_notebook(&self.scan_config)?;
        self.records = records.into_iter().map(|r| (r.note.stem.clone(), r)).collect();
        self.rebuild_indices();
        self.initialized = true;
        debug!(notes = self.arena.len(), "full rebuild complete");
        Ok(())
    }

    fn apply_delta(&mut self, changed_paths: &[String]) -> Result<()> {
        for path in changed_paths {
            let absolute = self.scan_config.notebook_root.join(path);
            self.records.retain(|_, r| r.note.path != *path);

            if absolute.exists() {
                let record = scan::scan_file(&self.scan_config.notebook_root, &absolute)?;
                self.records.insert(record.note.stem.clone(), record);
            }
        }
        self.rebuild_indices();
        self.initialized = true;
        Ok(())
    }

    fn rebuild_indices(&mut self) {
        self.arena = self.records.keys().cloned().collect();
        self.arena.sort();
        self.by_stem = self.arena.iter().enumerate().map(|(i, stem)| (stem.clone(), i)).collect();

        self.forward = vec![Vec::new(); self.arena.len()];
        self.reverse = vec![Vec::new(); self.arena.len()];
        for (idx, stem) in self.arena.iter().enumerate() {
            let note = &self.records[stem].note;
            for target_stem in &note.links_out {
                if let Some(&target_idx) = self.by_stem.get(target_stem) {
                    self.forward[idx].push(target_idx);
                    self.reverse[target_idx].push(idx);
                }
            }
        }

        let docs: Vec<&[String]> = self
            .arena
            .iter()
            .map(|stem| self.records[stem].body_tokens.as_slice())
            .collect();
        self.doc_freq = DocFrequencies::build(docs.into_iter());
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet as HSet;
    use std::io::Write;

    fn write_note(dir: &std::path::Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::File::create(path).unwrap().write_all(content.as_bytes()).unwrap();
    }

    fn seeded_engine() -> (tempfile::TempDir, LinkGraphEngine) {
        let dir = tempfile::tempdir().unwrap();
        write_note(
            dir.path(),
            "a.md",
            "---\nid: a\ntitle: Graph A\ntags: [graph]\n---\n# Intro\nSee [[b]].\n",
        );
        write_note(
            dir.path(),
            "b.md",
            "---\nid: b\ntitle: Graph B\ntags: [graph]\n---\n# Intro\nSee [[c]].\n",
        );
        write_note(dir.path(), "c.md", "---\nid: c\ntitle: Cooking\ntags: [food]\n---\n# Intro\nRecipes.\n");

        let config = ScanConfig {
            notebook_root: dir.path().to_path_buf(),
            include_dirs: None,
            exclude_dirs: HSet::new(),
        };
        let mut engine = LinkGraphEngine::new(config);
        engine.refresh_plan_apply(&[], true, 100).unwrap();
        engine.full_rebuild().unwrap();
        (dir, engine)
    }

    #[test]
    fn search_before_init_fails_engine_unavailable() {
        let config = ScanConfig {
            notebook_root: "/nonexistent".into(),
            include_dirs: None,
            exclude_dirs: HSet::new(),
        };
        let engine = LinkGraphEngine::new(config);
        let err = engine.search_planned("x", 10, SearchOptions::default()).unwrap_err();
        assert!(matches!(err, LinkGraphError::EngineUnavailable));
    }

    #[test]
    fn zero_limit_is_invalid_option() {
        let (_dir, engine) = seeded_engine();
        let err = engine.search_planned("graph", 0, SearchOptions::default()).unwrap_err();
        assert!(matches!(err, LinkGraphError::InvalidOption(_)));
    }

    #[test]
    fn search_respects_limit_and_nonnegative_scores() {
        let (_dir, engine) = seeded_engine();
        let outcome = engine.search_planned("graph", 1, SearchOptions::default()).unwrap();
        assert!(outcome.hits.len() <= 1);
        assert!(outcome.hits.iter().all(|h| h.score >= 0.0));
    }

    #[test]
    fn metadata_present_and_absent() {
        let (_dir, engine) = seeded_engine();
        assert!(engine.metadata("a").unwrap().is_some());
        assert!(engine.metadata("ghost").unwrap().is_none());
    }

    #[test]
    fn neighbors_outgoing_one_hop() {
        let (_dir, engine) = seeded_engine();
        let neighbors = engine.neighbors("a", Direction::Outgoing, 1, 10).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].stem, "b");
        assert_eq!(neighbors[0].direction, Direction::Outgoing);
    }

    #[test]
    fn neighbors_both_two_hops_covers_c() {
        let (_dir, engine) = seeded_engine();
        let neighbors = engine.neighbors("a", Direction::Both, 2, 10).unwrap();
        let stems: Vec<&str> = neighbors.iter().map(|n| n.stem.as_str()).collect();
        assert!(stems.contains(&"b"));
        assert!(stems.contains(&"c"));
    }

    #[test]
    fn related_excludes_self_and_respects_distance() {
        let (_dir, engine) = seeded_engine();
        let related = engine.related("a", 1, 10).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].stem, "b");
    }

    #[test]
    fn stats_counts_orphans_and_edges() {
        let (_dir, engine) = seeded_engine();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_notes, 3);
        assert_eq!(stats.orphans, 0);
        assert_eq!(stats.links_in_graph, 2);
    }

    #[test]
    fn toc_is_sorted_by_path() {
        let (_dir, engine) = seeded_engine();
        let toc = engine.toc(10).unwrap();
        let paths: Vec<&str> = toc.iter().map(|e| e.path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn refresh_noop_when_no_changed_paths() {
        let (_dir, mut engine) = seeded_engine();
        let result = engine.refresh_plan_apply(&[], false, 100).unwrap();
        assert_eq!(result.mode, RefreshMode::Noop);
        assert_eq!(result.changed_count, 0);
    }

    #[test]
    fn refresh_threshold_exceeded_triggers_full() {
        let (_dir, mut engine) = seeded_engine();
        let result = engine.refresh_plan_apply(&["a.md".to_string()], false, 1).unwrap();
        assert_eq!(result.mode, RefreshMode::Full);
        assert!(result.events.iter().any(|e| e.phase == "rebuild.full" && e.success));
    }

    #[test]
    fn refresh_delta_reindexes_single_path() {
        let (dir, mut engine) = seeded_engine();
        write_note(dir.path(), "a.md", "---\nid: a\ntitle: Graph A v2\ntags: [graph]\n---\n# Intro\nSee [[c]].\n");
        let result = engine.refresh_plan_apply(&["a.md".to_string()], false, 100).unwrap();
        assert_eq!(result.mode, RefreshMode::Delta);
        assert_eq!(engine.metadata("a").unwrap().unwrap().title, "Graph A v2");
    }
}

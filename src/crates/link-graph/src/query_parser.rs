//! Operator-bearing query syntax parser.
//!
//! Turns a raw query string like `tag:(architecture OR design) -tag:draft
//! sort:path_asc "exact phrase"` into a normalized [`SearchPlan`]. Free
//! text and quoted phrases accumulate into `query_text`; everything else
//! is a recognized operator that populates `filters` or `sort_terms`.

use crate::error::{LinkGraphError, Result};
use crate::model::{
    Filters, MatchStrategy, PprOptions, RelatedFilter, SearchPlan, SortOrder, SortTerm, SubgraphMode,
};

/// Parse `query` into its effective [`SearchPlan`]. Never fails on its own —
/// malformed operator values are treated as free text rather than rejected,
/// since operator syntax is advisory; callers that need hard validation
/// layer it via `SearchOptions` overrides, which is where [`LinkGraphError::InvalidOption`]
/// is actually raised (see `LinkGraphEngine::search_planned`).
pub fn parse(query: &str) -> SearchPlan {
    let mut filters = Filters::default();
    let mut sort_terms: Vec<SortTerm> = Vec::new();
    let mut free_text_parts: Vec<String> = Vec::new();

    for token in split_respecting_quotes(query) {
        if let Some(value) = token.strip_prefix("-tag:") {
            filters.tags_not.extend(parse_or_list(value));
        } else if let Some(value) = token.strip_prefix("tag:") {
            filters.tags_any.extend(parse_or_list(value));
        } else if let Some(value) = token.strip_prefix("link_to:") {
            filters.link_to.extend(split_comma(value));
        } else if let Some(value) = token.strip_prefix("linked_by:") {
            filters.linked_by.extend(split_comma(value));
        } else if let Some(value) = token.strip_prefix("related:") {
            if let Some(related) = parse_related(value) {
                filters.related.push(related);
            }
        } else if let Some(value) = token.strip_prefix("sort:") {
            if let Some(term) = parse_sort_term(value) {
                sort_terms.push(term);
            }
        } else {
            let trimmed = token.trim_matches('"');
            if !trimmed.is_empty() {
                free_text_parts.push(trimmed.to_string());
            }
        }
    }

    let query_text = free_text_parts.join(" ");
    let match_strategy = if query_text.trim().is_empty() && !filters.is_empty() {
        MatchStrategy::Exact
    } else {
        MatchStrategy::Fts
    };

    SearchPlan {
        query_text,
        match_strategy,
        case_sensitive: false,
        sort_terms: if sort_terms.is_empty() {
            vec![SortTerm {
                field: "score".to_string(),
                order: SortOrder::Desc,
            }]
        } else {
            sort_terms
        },
        filters,
    }
}

/// Split on whitespace, but keep `"quoted phrases"` (including the
/// operator prefix if any, e.g. `sort:"..."` is not a real case today but
/// kept for symmetry) together as a single token.
fn split_respecting_quotes(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// `(architecture OR design)` or a bare `architecture` value.
fn parse_or_list(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value);
    inner
        .split(" OR ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn split_comma(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `related:<stem>[,max_distance=N][,alpha=..][,max_iter=..][,tol=..][,subgraph_mode=force]`
fn parse_related(value: &str) -> Option<RelatedFilter> {
    let mut parts = value.split(',');
    let seed = parts.next()?.trim().to_string();
    if seed.is_empty() {
        return None;
    }

    let mut max_distance = 1u32;
    let mut ppr: Option<PprOptions> = None;

    for part in parts {
        let Some((key, val)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        match key {
            "max_distance" => {
                if let Ok(n) = val.parse() {
                    max_distance = n;
                }
            }
            "alpha" => {
                let p = ppr.get_or_insert_with(PprOptions::default);
                if let Ok(n) = val.parse() {
                    p.alpha = n;
                }
            }
            "max_iter" => {
                let p = ppr.get_or_insert_with(PprOptions::default);
                if let Ok(n) = val.parse() {
                    p.max_iter = n;
                }
            }
            "tol" => {
                let p = ppr.get_or_insert_with(PprOptions::default);
                if let Ok(n) = val.parse() {
                    p.tol = n;
                }
            }
            "subgraph_mode" => {
                let p = ppr.get_or_insert_with(PprOptions::default);
                p.subgraph_mode = if val == "force" {
                    SubgraphMode::Force
                } else {
                    SubgraphMode::Unrestricted
                };
            }
            _ => {}
        }
    }

    Some(RelatedFilter {
        seed,
        max_distance,
        ppr,
    })
}

/// `<field>_<asc|desc>`, e.g. `path_asc` -> `(path, asc)`.
fn parse_sort_term(value: &str) -> Option<SortTerm> {
    let (field, order) = value.rsplit_once('_')?;
    let order = match order {
        "asc" => SortOrder::Asc,
        "desc" => SortOrder::Desc,
        _ => return None,
    };
    if field.is_empty() {
        return None;
    }
    Some(SortTerm {
        field: field.to_string(),
        order,
    })
}

/// Validate caller-supplied overrides that the free-form operator parser
/// can't reject on its own (it never fails). Called by the engine before a
/// parsed/overridden plan is executed.
pub fn validate_plan(plan: &SearchPlan) -> Result<()> {
    for related in &plan.filters.related {
        if related.max_distance == 0 {
            return Err(LinkGraphError::InvalidOption(
                "related max_distance must be >= 1".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_and_negated_tag_and_sort() {
        let plan = parse("tag:(architecture OR design) -tag:draft sort:path_asc");
        assert_eq!(plan.match_strategy, MatchStrategy::Exact);
        assert_eq!(plan.filters.tags_any, vec!["architecture", "design"]);
        assert_eq!(plan.filters.tags_not, vec!["draft"]);
        assert_eq!(plan.sort_terms, vec![SortTerm { field: "path".into(), order: SortOrder::Asc }]);
        assert!(plan.query_text.is_empty());
    }

    #[test]
    fn free_text_without_operators_keeps_fts_strategy() {
        let plan = parse("graph theory notes");
        assert_eq!(plan.match_strategy, MatchStrategy::Fts);
        assert_eq!(plan.query_text, "graph theory notes");
    }

    #[test]
    fn quoted_phrase_strips_quotes_into_query_text() {
        let plan = parse("\"exact phrase\" extra");
        assert_eq!(plan.query_text, "exact phrase extra");
    }

    #[test]
    fn related_filter_parses_ppr_knobs() {
        let plan = parse("related:bfs,max_distance=2,alpha=0.7,subgraph_mode=force");
        assert_eq!(plan.filters.related.len(), 1);
        let related = &plan.filters.related[0];
        assert_eq!(related.seed, "bfs");
        assert_eq!(related.max_distance, 2);
        let ppr = related.ppr.as_ref().unwrap();
        assert_eq!(ppr.alpha, 0.7);
        assert_eq!(ppr.subgraph_mode, SubgraphMode::Force);
    }

    #[test]
    fn validate_rejects_zero_max_distance() {
        let mut plan = parse("graph");
        plan.filters.related.push(RelatedFilter {
            seed: "x".into(),
            max_distance: 0,
            ppr: None,
        });
        assert!(validate_plan(&plan).is_err());
    }
}

//! Small internal tokenizer and BM25-lite scorer.
//!
//! No full-text-search crate sits in the dependency set for this subdomain,
//! so FTS and path-fuzzy matching are done with a lowercase-alnum tokenizer
//! and a hand-rolled term-frequency scorer with length normalization. Kept
//! deliberately reusable (free functions, no engine-specific state) so the
//! skill-matching router can score against the same tokens later.

use std::collections::HashMap;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Lowercase, split on anything that isn't alphanumeric, drop empty tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

pub fn term_frequencies(tokens: &[String]) -> HashMap<&str, usize> {
    let mut freqs = HashMap::new();
    for t in tokens {
        *freqs.entry(t.as_str()).or_insert(0) += 1;
    }
    freqs
}

/// A tiny corpus-level document frequency table, built once per index
/// generation and reused across queries against the same graph.
#[derive(Debug, Clone, Default)]
pub struct DocFrequencies {
    pub doc_count: usize,
    pub avg_doc_len: f64,
    pub term_doc_freq: HashMap<String, usize>,
}

impl DocFrequencies {
    pub fn build<'a>(docs: impl Iterator<Item = &'a [String]>) -> Self {
        let mut term_doc_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_count = 0usize;
        let mut total_len = 0usize;

        for tokens in docs {
            doc_count += 1;
            total_len += tokens.len();
            let unique: std::collections::HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *term_doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let avg_doc_len = if doc_count == 0 {
            0.0
        } else {
            total_len as f64 / doc_count as f64
        };

        Self {
            doc_count,
            avg_doc_len,
            term_doc_freq,
        }
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.doc_count as f64;
        let df = *self.term_doc_freq.get(term).unwrap_or(&0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

/// BM25-lite score of `query_tokens` against one document's tokens.
pub fn bm25_score(query_tokens: &[String], doc_tokens: &[String], stats: &DocFrequencies) -> f64 {
    if doc_tokens.is_empty() || stats.doc_count == 0 {
        return 0.0;
    }

    let doc_len = doc_tokens.len() as f64;
    let freqs = term_frequencies(doc_tokens);
    let mut score = 0.0;

    for term in query_tokens {
        let tf = *freqs.get(term.as_str()).unwrap_or(&0) as f64;
        if tf == 0.0 {
            continue;
        }
        let idf = stats.idf(term);
        let norm = tf * (BM25_K1 + 1.0)
            / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / stats.avg_doc_len.max(1.0)));
        score += idf * norm;
    }

    score.max(0.0)
}

/// Case-insensitive substring/fuzzy score in `[0, 1]` for path matching.
/// Exact substring match scores `1.0`; otherwise falls back to the fraction
/// of query tokens that appear anywhere in the path.
pub fn path_fuzzy_score(query: &str, path: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let path_lower = path.to_lowercase();
    if query_lower.is_empty() {
        return 0.0;
    }
    if path_lower.contains(&query_lower) {
        return 1.0;
    }

    let tokens = tokenize(&query_lower);
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens.iter().filter(|t| path_lower.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Graph-Theory, BFS!"),
            vec!["graph", "theory", "bfs"]
        );
    }

    #[test]
    fn bm25_favors_documents_with_more_term_occurrences() {
        let docs = vec![
            tokenize("graph theory and graph traversal"),
            tokenize("a completely unrelated cooking recipe"),
        ];
        let stats = DocFrequencies::build(docs.iter().map(|d| d.as_slice()));
        let query = tokenize("graph");

        let score_a = bm25_score(&query, &docs[0], &stats);
        let score_b = bm25_score(&query, &docs[1], &stats);
        assert!(score_a > score_b);
    }

    #[test]
    fn path_fuzzy_exact_substring_scores_one() {
        assert_eq!(path_fuzzy_score("notes/graph", "notes/graph/theory.md"), 1.0);
    }

    #[test]
    fn path_fuzzy_partial_token_overlap_is_fractional() {
        let score = path_fuzzy_score("graph cooking", "notes/graph/theory.md");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn path_fuzzy_empty_query_scores_zero() {
        assert_eq!(path_fuzzy_score("", "anything.md"), 0.0);
    }
}

//! Notebook tree scan: turns Markdown files into [`Note`] records plus the
//! internal, non-public token/lead data the engine needs for scoring.
//!
//! Grounded in the teacher's `walkdir`-based directory traversal idiom
//! (`orca`/`orchestrator` both walk project trees for discovery) combined
//! with a small hand-rolled frontmatter/heading/wikilink scanner, since no
//! Markdown-frontmatter crate sits in the corpus's dependency set for this
//! subdomain.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha1::{Digest, Sha1};
use walkdir::WalkDir;

use crate::error::{LinkGraphError, Result};
use crate::model::{Note, Section};
use crate::text_index::tokenize;

const LEAD_MAX_CHARS: usize = 100;

/// Directories to never descend into, even if the caller's configured
/// exclusion set somehow omits them. The backend layers its own exclusions
/// on top of this via [`ScanConfig::exclude_dirs`].
const HARD_EXCLUDE: &[&str] = &[".git"];

/// Resolved scan policy, built by the backend and handed to the engine.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub notebook_root: PathBuf,
    /// `None` means "walk everything under the root not excluded".
    pub include_dirs: Option<Vec<String>>,
    /// Lower-cased, de-hidden, de-duplicated exclusion set (baseline + extensions).
    pub exclude_dirs: HashSet<String>,
}

/// Everything the engine keeps about a note beyond the public [`Note`] shape:
/// the tokenized body (for FTS/BM25) and a short lead for TOC entries.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub note: Note,
    pub body_tokens: Vec<String>,
    pub lead: String,
}

/// Walk `config.notebook_root` and scan every Markdown file found into a
/// [`NoteRecord`]. Excluded directories are pruned during the walk so large
/// excluded subtrees are never descended into.
pub fn scan_notebook(config: &ScanConfig) -> Result<Vec<NoteRecord>> {
    let roots = resolve_roots(config);
    let mut records = Vec::new();

    for root in roots {
        if !root.exists() {
            continue;
        }
        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            !HARD_EXCLUDE.contains(&name.as_str()) && !config.exclude_dirs.contains(&name)
        });

        for entry in walker {
            let entry = entry.map_err(|e| LinkGraphError::Scan(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            records.push(scan_file(&config.notebook_root, entry.path())?);
        }
    }

    Ok(records)
}

/// Scan a single file, given the notebook root it's relative to. Used both
/// by the full walk above and by delta refresh, which re-scans one path at
/// a time.
pub fn scan_file(notebook_root: &Path, absolute_path: &Path) -> Result<NoteRecord> {
    let bytes = std::fs::read(absolute_path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let rel_path = relative_slash_path(notebook_root, absolute_path);

    let fingerprint = fingerprint_of(&bytes);
    let (frontmatter, body) = split_frontmatter(&content);

    let default_stem = absolute_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_path.clone());

    let stem = frontmatter
        .get("id")
        .or_else(|| frontmatter.get("stem"))
        .cloned()
        .unwrap_or(default_stem);

    let title = frontmatter
        .get("title")
        .cloned()
        .or_else(|| first_heading(&body))
        .unwrap_or_else(|| stem.clone());

    let tags = dedup_tags_preserving_order(parse_tags(&frontmatter, &content));
    let sections = parse_sections(&body);
    let links_out = parse_wikilinks(&body, &stem);
    let lead = lead_of(&body);
    let body_tokens = tokenize(&content);

    let note = Note {
        stem,
        title,
        path: rel_path,
        tags,
        sections,
        links_out,
        fingerprint,
    };

    Ok(NoteRecord {
        note,
        body_tokens,
        lead,
    })
}

fn resolve_roots(config: &ScanConfig) -> Vec<PathBuf> {
    match &config.include_dirs {
        Some(dirs) => dirs.iter().map(|d| config.notebook_root.join(d)).collect(),
        None => vec![config.notebook_root.clone()],
    }
}

fn fingerprint_of(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a leading `---\n...\n---` YAML-ish frontmatter block off the top
/// of the file, returning `(fields, remaining body)`. Absent or malformed
/// frontmatter yields an empty field map and the whole file as body.
fn split_frontmatter(content: &str) -> (std::collections::HashMap<String, String>, String) {
    let mut fields = std::collections::HashMap::new();
    let mut lines = content.lines();

    let Some(first) = lines.next() else {
        return (fields, String::new());
    };
    if first.trim() != "---" {
        return (fields, content.to_string());
    }

    let mut body_lines = Vec::new();
    let mut in_frontmatter = true;
    let mut current_key: Option<String> = None;

    for line in lines {
        if in_frontmatter {
            if line.trim() == "---" {
                in_frontmatter = false;
                continue;
            }
            if let Some(rest) = line.trim_start().strip_prefix("- ") {
                if let Some(key) = &current_key {
                    let entry = fields.entry(key.clone()).or_insert_with(String::new);
                    if !entry.is_empty() {
                        entry.push(',');
                    }
                    entry.push_str(rest.trim());
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_string();
                let value = value.trim().to_string();
                current_key = Some(key.clone());
                if !value.is_empty() {
                    fields.insert(key, value);
                }
            }
        } else {
            body_lines.push(line);
        }
    }

    (fields, body_lines.join("\n"))
}

fn parse_tags(frontmatter: &std::collections::HashMap<String, String>, _content: &str) -> Vec<String> {
    let Some(raw) = frontmatter.get("tags") else {
        return Vec::new();
    };
    let raw = raw.trim().trim_start_matches('[').trim_end_matches(']');
    raw.split(',')
        .map(|t| t.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn dedup_tags_preserving_order(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        if seen.insert(tag.to_lowercase()) {
            out.push(tag);
        }
    }
    out
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.trim_start().strip_prefix('#'))
        .map(|rest| rest.trim_start_matches('#').trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_sections(body: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, u8, usize)> = None;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some(hashes_rest) = heading_prefix(trimmed) {
            if let Some((heading, level, word_count)) = current.take() {
                sections.push(Section {
                    heading,
                    level,
                    word_count,
                });
            }
            let (level, heading) = hashes_rest;
            current = Some((heading, level, 0));
        } else if let Some((_, _, word_count)) = current.as_mut() {
            *word_count += line.split_whitespace().count();
        }
    }
    if let Some((heading, level, word_count)) = current {
        sections.push(Section {
            heading,
            level,
            word_count,
        });
    }
    sections
}

/// Returns `(level, heading text)` if `line` is a Markdown ATX heading.
fn heading_prefix(line: &str) -> Option<(u8, String)> {
    if !line.starts_with('#') {
        return None;
    }
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest.trim().to_string()))
}

fn parse_wikilinks(body: &str, self_stem: &str) -> Vec<String> {
    let re = Regex::new(r"\[\[([^\]|#]+)(?:[|#][^\]]*)?\]\]").expect("static wikilink regex");
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cap in re.captures_iter(body) {
        let target = cap[1].trim().to_string();
        if target.is_empty() || target == self_stem {
            continue;
        }
        if seen.insert(target.clone()) {
            out.push(target);
        }
    }
    out
}

fn lead_of(body: &str) -> String {
    let text: String = body
        .lines()
        .filter(|l| heading_prefix(l.trim_start()).is_none())
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = text.trim();
    if trimmed.chars().count() <= LEAD_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(LEAD_MAX_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_note(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn scans_frontmatter_tags_and_wikilinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_note(
            dir.path(),
            "notes/graph.md",
            "---\nid: graph-theory\ntitle: Graph Theory\ntags: [Math, math, Algorithms]\n---\n# Intro\nSee [[bfs]] and [[bfs]] again.\n",
        );

        let record = scan_file(dir.path(), &path).unwrap();
        assert_eq!(record.note.stem, "graph-theory");
        assert_eq!(record.note.title, "Graph Theory");
        assert_eq!(record.note.tags, vec!["Math", "Algorithms"]);
        assert_eq!(record.note.links_out, vec!["bfs"]);
        assert_eq!(record.note.sections.len(), 1);
        assert_eq!(record.note.sections[0].level, 1);
    }

    #[test]
    fn falls_back_to_filename_stem_without_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_note(dir.path(), "plain.md", "# Plain Note\nJust text.\n");
        let record = scan_file(dir.path(), &path).unwrap();
        assert_eq!(record.note.stem, "plain");
        assert_eq!(record.note.title, "Plain Note");
    }

    #[test]
    fn self_links_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_note(dir.path(), "self.md", "---\nid: self\n---\nSee [[self]] and [[other]].\n");
        let record = scan_file(dir.path(), &path).unwrap();
        assert_eq!(record.note.links_out, vec!["other"]);
    }

    #[test]
    fn excluded_directories_are_pruned_from_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "keep/a.md", "# A\n");
        write_note(dir.path(), ".git/b.md", "# B\n");

        let config = ScanConfig {
            notebook_root: dir.path().to_path_buf(),
            include_dirs: None,
            exclude_dirs: HashSet::new(),
        };
        let records = scan_notebook(&config).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].note.path, "keep/a.md");
    }
}

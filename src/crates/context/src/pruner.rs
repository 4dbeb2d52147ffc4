//! Bounded-cost context window management. Every operation here is a pure
//! function of its inputs; tokenizer failure downgrades to an estimate and
//! never raises.

use graph_runtime::{Message, MessageRole};

/// Fraction of `truncate_middle`'s budget spent on the head of the text; the
/// remainder (~60%) goes to the tail. Named rather than inlined because the
/// 40/60 split is a normative constant, not an arbitrary literal.
pub const TRUNCATE_KEEP_FIRST_RATIO: f64 = 0.4;

const TRUNCATION_MARKER: &str = "\n\n[... truncated ...]\n\n";
const ROLE_TOKEN_SURCHARGE: usize = 4;
const MAX_LESSON_ERROR_CHARS: usize = 500;
const EXTRACTIVE_FALLBACK_LIMIT: usize = 10;
const EXTRACTIVE_LINE_MAX_CHARS: usize = 200;

/// The error a failed attempt raised, as handed to [`ContextPruner::prune_for_retry`].
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub error_type: String,
    pub description: String,
}

/// Configuration for pruning and compression. Cloned cheaply; safe to keep
/// one instance per [`crate::manager::ContextManager`].
#[derive(Debug, Clone)]
pub struct ContextPruner {
    pub max_tokens: usize,
    /// Non-system messages kept intact by `compress_messages`'s working zone
    /// is `window_size * 2` (roughly `window_size` user/assistant turns).
    pub window_size: usize,
    pub max_tool_output: usize,
}

impl Default for ContextPruner {
    fn default() -> Self {
        Self {
            max_tokens: 8_000,
            window_size: 5,
            max_tool_output: 500,
        }
    }
}

impl ContextPruner {
    pub fn new(max_tokens: usize, window_size: usize, max_tool_output: usize) -> Self {
        Self {
            max_tokens,
            window_size,
            max_tool_output,
        }
    }

    /// BPE token count when a tokenizer is available, else a `len/4` ceiling estimate.
    pub fn count_tokens(&self, text: &str) -> usize {
        bpe_token_count(text).unwrap_or_else(|| ceiling_div(text.chars().count(), 4))
    }

    pub fn count_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.count_tokens(&m.content) + ROLE_TOKEN_SURCHARGE)
            .sum()
    }

    /// Keep every system message, then keep the most recent non-system
    /// messages that fit the budget (at least one, even if it alone exceeds
    /// the budget — `prune` never returns an empty non-system tail when the
    /// input had one).
    pub fn prune(&self, messages: &[Message]) -> Vec<Message> {
        let (system, rest) = split_system(messages);
        let mut budget = self.max_tokens.saturating_sub(self.count_messages(&system));

        let mut kept_rev: Vec<&Message> = Vec::new();
        for message in rest.iter().rev() {
            let cost = self.count_tokens(&message.content) + ROLE_TOKEN_SURCHARGE;
            if kept_rev.is_empty() {
                kept_rev.push(message);
                budget = budget.saturating_sub(cost);
                continue;
            }
            if cost > budget {
                break;
            }
            kept_rev.push(message);
            budget = budget.saturating_sub(cost);
        }
        kept_rev.reverse();

        let mut result = system;
        result.extend(kept_rev.into_iter().cloned());
        result
    }

    /// "Safety zone" compression: the working zone (last `window_size * 2`
    /// non-system messages) is untouched; archive-zone tool outputs longer
    /// than `max_tool_output` are replaced with a truncated preview and a
    /// system-note suffix. Non-tool archive messages are preserved verbatim.
    pub fn compress_messages(&self, messages: &[Message]) -> Vec<Message> {
        let (system, rest) = split_system(messages);
        let working_len = (self.window_size * 2).min(rest.len());
        let split_at = rest.len() - working_len;
        let (archive, working) = rest.split_at(split_at);

        let compressed_archive: Vec<Message> = archive.iter().map(|m| self.compress_archive_message(m)).collect();

        let mut result = system;
        result.extend(compressed_archive);
        result.extend(working.iter().cloned());
        result
    }

    fn compress_archive_message(&self, message: &Message) -> Message {
        if message.role != MessageRole::Tool || message.content.chars().count() <= self.max_tool_output {
            return message.clone();
        }
        let hidden = message.content.chars().count() - self.max_tool_output;
        let preview: String = message.content.chars().take(self.max_tool_output).collect();
        let mut compressed = message.clone();
        compressed.content = format!("{preview}\n[SYSTEM NOTE: Output truncated. {hidden} chars hidden.]");
        compressed
    }

    /// Keep the first ~40% and last ~60% of `text`, separated by a literal marker.
    pub fn truncate_middle(&self, text: &str, max_tokens: usize) -> String {
        if self.count_tokens(text) <= max_tokens {
            return text.to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let max_chars = max_tokens.saturating_mul(4);
        if chars.len() <= max_chars {
            return text.to_string();
        }

        let head_chars = ((max_chars as f64) * TRUNCATE_KEEP_FIRST_RATIO).floor() as usize;
        let tail_chars = max_chars.saturating_sub(head_chars);

        let head: String = chars[..head_chars.min(chars.len())].iter().collect();
        let tail_start = chars.len().saturating_sub(tail_chars);
        let tail: String = chars[tail_start..].iter().collect();

        format!("{head}{TRUNCATION_MARKER}{tail}")
    }

    /// Build a retry context: system messages, a "lesson learned" message
    /// describing the failure, then the compressed remainder — middle-
    /// truncated into a single message if still over budget.
    pub fn prune_for_retry(&self, messages: &[Message], error: &ErrorInfo, max_tokens: usize) -> Vec<Message> {
        let (system, rest) = split_system(messages);
        let lesson = lesson_learned_message(error);

        let mut result = system;
        result.push(lesson);

        let compressed_rest = self.compress_messages_slice(&rest);
        let rest_tokens = self.count_messages(&compressed_rest) + self.count_messages(&result);

        if rest_tokens <= max_tokens {
            result.extend(compressed_rest);
            return result;
        }

        let archive_text = compressed_rest
            .iter()
            .map(|m| format!("[{:?}] {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let budget = max_tokens.saturating_sub(self.count_messages(&result));
        let truncated = self.truncate_middle(&archive_text, budget);

        let mut compressed_message = Message::system(truncated);
        compressed_message.name = Some("compressed".to_string());
        result.push(compressed_message);
        result
    }

    fn compress_messages_slice(&self, rest: &[Message]) -> Vec<Message> {
        rest.iter().map(|m| self.compress_archive_message(m)).collect()
    }
}

fn lesson_learned_message(error: &ErrorInfo) -> Message {
    let description: String = error.description.chars().take(MAX_LESSON_ERROR_CHARS).collect();
    Message::user(format!("Lesson learned: encountered {} — {}", error.error_type, description))
}

fn split_system(messages: &[Message]) -> (Vec<Message>, Vec<Message>) {
    let mut system = Vec::new();
    let mut rest = Vec::new();
    for message in messages {
        if message.role.is_system() {
            system.push(message.clone());
        } else {
            rest.push(message.clone());
        }
    }
    (system, rest)
}

/// Extractive fallback used when the external summarizer is unreachable:
/// concatenate up to 10 truncated `[role]: content` lines.
pub fn extractive_summary(messages: &[Message]) -> String {
    messages
        .iter()
        .take(EXTRACTIVE_FALLBACK_LIMIT)
        .map(|m| {
            let content: String = m.content.chars().take(EXTRACTIVE_LINE_MAX_CHARS).collect();
            format!("[{:?}]: {}", m.role, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bpe_token_count(text: &str) -> Option<usize> {
    tiktoken_rs::cl100k_base().ok().map(|bpe| bpe.encode_with_special_tokens(text).len())
}

fn ceiling_div(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages_with(n: usize) -> Vec<Message> {
        let mut out = vec![Message::system("be helpful")];
        for i in 0..n {
            out.push(Message::user(format!("question {i}")));
            out.push(Message::assistant(format!("answer {i}")));
        }
        out
    }

    #[test]
    fn count_tokens_never_zero_for_nonempty_text() {
        let pruner = ContextPruner::default();
        assert!(pruner.count_tokens("hello world") > 0);
    }

    #[test]
    fn prune_keeps_system_and_is_idempotent() {
        let pruner = ContextPruner::new(40, 5, 500);
        let messages = messages_with(20);
        let once = pruner.prune(&messages);
        let twice = pruner.prune(&once);
        assert!(once[0].role.is_system());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn prune_keeps_at_least_one_non_system_message() {
        let pruner = ContextPruner::new(1, 5, 500);
        let messages = messages_with(5);
        let pruned = pruner.prune(&messages);
        assert!(pruned.len() >= 2);
    }

    #[test]
    fn compress_messages_truncates_long_tool_output_in_archive_zone() {
        let pruner = ContextPruner::new(8_000, 1, 10);
        let mut messages = vec![Message::system("sys")];
        messages.push(Message::tool("x".repeat(50), "search"));
        messages.push(Message::user("q1"));
        messages.push(Message::assistant("a1"));

        let compressed = pruner.compress_messages(&messages);
        let tool_msg = compressed.iter().find(|m| m.role == MessageRole::Tool).unwrap();
        assert!(tool_msg.content.contains("SYSTEM NOTE"));
        assert!(tool_msg.content.len() < 50);
    }

    #[test]
    fn compress_messages_preserves_working_zone_untouched() {
        let pruner = ContextPruner::new(8_000, 2, 5);
        let messages = messages_with(2);
        let compressed = pruner.compress_messages(&messages);
        assert_eq!(compressed.len(), messages.len());
    }

    #[test]
    fn truncate_middle_keeps_head_and_tail_with_marker() {
        let pruner = ContextPruner::default();
        let text = "a".repeat(1000);
        let truncated = pruner.truncate_middle(&text, 10);
        assert!(truncated.contains(TRUNCATION_MARKER));
        assert!(truncated.len() < text.len());
    }

    #[test]
    fn truncate_middle_is_noop_under_budget() {
        let pruner = ContextPruner::default();
        let text = "short text";
        assert_eq!(pruner.truncate_middle(text, 1000), text);
    }

    #[test]
    fn prune_for_retry_includes_lesson_learned_message() {
        let pruner = ContextPruner::new(8_000, 5, 500);
        let messages = messages_with(3);
        let error = ErrorInfo {
            error_type: "ValueError".to_string(),
            description: "boom".to_string(),
        };
        let retry_context = pruner.prune_for_retry(&messages, &error, 8_000);
        assert!(retry_context.iter().any(|m| m.content.contains("Lesson learned") && m.content.contains("boom")));
    }

    #[test]
    fn prune_for_retry_falls_back_to_single_compressed_message_under_tight_budget() {
        let pruner = ContextPruner::new(8_000, 5, 500);
        let messages = messages_with(50);
        let error = ErrorInfo {
            error_type: "ValueError".to_string(),
            description: "boom".to_string(),
        };
        let retry_context = pruner.prune_for_retry(&messages, &error, 30);
        assert!(retry_context.iter().any(|m| m.name.as_deref() == Some("compressed")));
    }

    #[test]
    fn extractive_summary_caps_at_ten_lines() {
        let messages = messages_with(20);
        let summary = extractive_summary(&messages);
        assert_eq!(summary.lines().count(), 10);
    }
}

//! The stateful context manager used by the agent loop: persistent system
//! prompts, a turn-based conversation history, and semantic compression
//! through an external [`Summarizer`].

use graph_runtime::{Message, MessageRole};
use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};
use crate::pruner::{extractive_summary, ContextPruner};
use crate::summarizer::{Summarizer, TrajectoryEntry};

const SUMMARY_MESSAGE_NAME: &str = "context_summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveContextStrategy {
    Full,
    Pruned,
    Recent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrunerConfigSnapshot {
    pub max_tokens: usize,
    pub window_size: usize,
    pub max_tool_output: usize,
}

impl From<&ContextPruner> for PrunerConfigSnapshot {
    fn from(pruner: &ContextPruner) -> Self {
        Self {
            max_tokens: pruner.max_tokens,
            window_size: pruner.window_size,
            max_tool_output: pruner.max_tool_output,
        }
    }
}

impl From<PrunerConfigSnapshot> for ContextPruner {
    fn from(snapshot: PrunerConfigSnapshot) -> Self {
        ContextPruner::new(snapshot.max_tokens, snapshot.window_size, snapshot.max_tool_output)
    }
}

/// The full round-trippable state of a [`ContextManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub system_prompts: Vec<String>,
    pub turns: Vec<Message>,
    pub turn_count: usize,
    pub summary: Option<String>,
    pub pruner_config: PrunerConfigSnapshot,
}

/// The stateful wrapper the agent loop drives directly.
pub struct ContextManager {
    system_prompts: Vec<String>,
    /// Flat, alternating user/assistant messages. The last entry is an
    /// "open turn" when it is a user message with no following assistant
    /// message.
    turns: Vec<Message>,
    /// The rolling compression summary, rendered as a standalone system
    /// message and surfaced ahead of `turns` by `get_active_context`. Not
    /// one of `system_prompts` — those are the caller's own instructions,
    /// preserved untouched across `compress()`.
    summary_message: Option<Message>,
    pruner: ContextPruner,
    retained_turns: usize,
}

impl ContextManager {
    pub fn new(pruner: ContextPruner, retained_turns: usize) -> Self {
        Self {
            system_prompts: Vec::new(),
            turns: Vec::new(),
            summary_message: None,
            pruner,
            retained_turns,
        }
    }

    /// Append to the persistent system-prompts list. Preserved across `compress()`.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.system_prompts.push(content.into());
    }

    pub fn get_system_prompt(&self) -> Vec<String> {
        self.system_prompts.clone()
    }

    /// Open a new turn with an empty assistant slot.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.turns.push(stamped(Message::user(content)));
    }

    /// Close the currently open turn.
    pub fn update_last_assistant(&mut self, content: impl Into<String>) -> Result<()> {
        match self.turns.last() {
            Some(last) if last.role == MessageRole::User => {
                self.turns.push(stamped(Message::assistant(content)));
                Ok(())
            }
            _ => Err(ContextError::NoOpenTurn),
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turns.iter().filter(|m| m.role == MessageRole::Assistant).count()
    }

    fn has_open_turn(&self) -> bool {
        matches!(self.turns.last(), Some(m) if m.role == MessageRole::User)
    }

    /// The interleaved user/assistant messages (plus the rolling summary
    /// message, if any), never including `system_prompts`.
    pub fn get_active_context(&self, strategy: ActiveContextStrategy) -> Vec<Message> {
        let mut prefix: Vec<Message> = self.summary_message.clone().into_iter().collect();

        let body = match strategy {
            ActiveContextStrategy::Full => self.turns.clone(),
            ActiveContextStrategy::Recent => {
                let keep = self.retained_turns * 2;
                let start = self.turns.len().saturating_sub(keep);
                self.turns[start..].to_vec()
            }
            ActiveContextStrategy::Pruned => {
                let mut with_summary = prefix.clone();
                with_summary.extend(self.turns.clone());
                let pruned = self.pruner.prune(&with_summary);
                prefix.clear();
                pruned
            }
        };

        prefix.extend(body);
        prefix
    }

    /// `(system_prompts, to_summarize, recent)` — `to_summarize` is every
    /// sealed turn older than the last `retained_turns` sealed turns;
    /// `recent` (plus a still-open turn, if any) is left untouched.
    pub fn segment(&self) -> (Vec<String>, Vec<Message>, Vec<Message>) {
        let open_tail: Vec<Message> = if self.has_open_turn() {
            vec![self.turns.last().cloned().unwrap()]
        } else {
            Vec::new()
        };
        let sealed_len = self.turns.len() - open_tail.len();
        let sealed = &self.turns[..sealed_len];

        let keep = self.retained_turns * 2;
        let split = sealed_len.saturating_sub(keep);

        let to_summarize = sealed[..split].to_vec();
        let mut recent = sealed[split..].to_vec();
        recent.extend(open_tail);

        (self.system_prompts.clone(), to_summarize, recent)
    }

    /// The semantic compression flow. Returns `false` (no-op) when there is
    /// nothing old enough to summarize.
    pub async fn compress(&mut self, summarizer: &dyn Summarizer) -> Result<bool> {
        let (_system, to_summarize, recent) = self.segment();
        if to_summarize.is_empty() {
            return Ok(false);
        }

        let trajectory = build_trajectory(&to_summarize);

        let summary_text = match summarizer.summarize(&trajectory).await {
            Ok(document) => crate::summarizer::extract_summary_body(&document),
            Err(_) => extractive_summary(&to_summarize),
        };

        let mut summary_message = Message::system(format!("[Context Summary]\n{summary_text}"));
        summary_message.name = Some(SUMMARY_MESSAGE_NAME.to_string());
        self.summary_message = Some(summary_message);
        self.turns = recent;

        Ok(true)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            system_prompts: self.system_prompts.clone(),
            turns: self.turns.clone(),
            turn_count: self.turn_count(),
            summary: self.summary_message.as_ref().map(|m| m.content.clone()),
            pruner_config: PrunerConfigSnapshot::from(&self.pruner),
        }
    }

    pub fn load_snapshot(snapshot: ContextSnapshot) -> Self {
        let summary_message = snapshot.summary.map(|text| {
            let mut message = Message::system(text);
            message.name = Some(SUMMARY_MESSAGE_NAME.to_string());
            message
        });
        Self {
            system_prompts: snapshot.system_prompts,
            turns: snapshot.turns,
            summary_message,
            pruner: snapshot.pruner_config.into(),
            retained_turns: 5,
        }
    }
}

fn stamped(mut message: Message) -> Message {
    message.metadata = Some(serde_json::json!({ "timestamp": chrono::Utc::now().to_rfc3339() }));
    message
}

fn build_trajectory(sealed_turns: &[Message]) -> Vec<TrajectoryEntry> {
    let mut trajectory = Vec::new();
    let mut pairs = sealed_turns.chunks(2);
    let mut turn_index = 0;
    while let Some(pair) = pairs.next() {
        let [user, assistant] = pair else { continue };
        trajectory.push(TrajectoryEntry::Goal { content: user.content.clone() });
        trajectory.push(TrajectoryEntry::Decision {
            title: format!("turn {turn_index}"),
            context: user.content.clone(),
            choice: assistant.content.clone(),
            rationale: String::new(),
            alternatives: Vec::new(),
        });
        turn_index += 1;
    }
    trajectory
}

//! The bounded anti-fragile retry loop.

use std::sync::Arc;

use checkpoint_store::{Checkpoint, CheckpointConfig, CheckpointSaver, Traveler};
use context::{ContextPruner, ErrorInfo};
use graph_runtime::{EventEmitter, GraphRuntime, Message, NullEventEmitter};
use serde_json::Value;

use crate::classify::{classify, Classification};
use crate::error::{AttemptFailure, AutofixError, Result};

/// A caller-supplied success check over the invocation's result.
pub type ValidatorFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Builds the patch applied to the forked checkpoint. Given the failure and
/// the already-pruned message list, returns the patch `Value` handed to
/// [`Traveler::fork_and_correct`].
pub type CorrectionFn = dyn Fn(&AttemptFailure, &[Message]) -> Value + Send + Sync;

/// Observability hook invoked after every attempt, success or failure.
pub type OnAttemptFn = dyn Fn(usize, &std::result::Result<Value, AttemptFailure>) + Send + Sync;

/// Bounded retry wrapper around a [`GraphRuntime`], backed by a
/// [`CheckpointSaver`] for fetching state and a [`Traveler`] for forking.
pub struct AutofixLoop {
    saver: Arc<dyn CheckpointSaver>,
    traveler: Traveler,
    events: Arc<dyn EventEmitter>,
    pruner: ContextPruner,
}

impl AutofixLoop {
    pub fn new(saver: Arc<dyn CheckpointSaver>, events: Arc<dyn EventEmitter>, pruner: ContextPruner) -> Self {
        let traveler = Traveler::with_events(saver.clone(), events.clone());
        Self { saver, traveler, events, pruner }
    }

    /// Build a loop that discards all emitted events.
    pub fn silent(saver: Arc<dyn CheckpointSaver>, pruner: ContextPruner) -> Self {
        Self::new(saver, Arc::new(NullEventEmitter), pruner)
    }

    /// Run `graph` to completion, validating each result and forking one
    /// step back to retry on a recoverable failure, up to `max_retries`
    /// times. Resumes retries with `current_input = None` (resume-from-state
    /// semantics) once a fork has produced a corrected checkpoint.
    pub async fn run(
        &self,
        graph: &dyn GraphRuntime,
        thread_id: &str,
        input: Value,
        config: Value,
        max_retries: usize,
        validator: Option<&ValidatorFn>,
        correction: Option<&CorrectionFn>,
        on_attempt: Option<&OnAttemptFn>,
    ) -> Result<Value> {
        let mut current_input = input;
        let mut current_config = config;
        let mut attempt = 0usize;
        let mut last_compression_ratio: Option<f64> = None;

        loop {
            self.events.emit(
                "autofix/attempt",
                serde_json::json!({ "thread_id": thread_id, "attempt": attempt }),
            );

            let outcome = self.invoke_and_validate(graph, current_input.clone(), current_config.clone(), validator).await;

            if let Some(on_attempt) = on_attempt {
                on_attempt(attempt, &outcome);
            }

            let failure = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        self.events.emit(
                            "autofix/recover",
                            serde_json::json!({
                                "thread_id": thread_id,
                                "attempt": attempt,
                                "compression_ratio": last_compression_ratio,
                            }),
                        );
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            if classify(&failure) == Classification::Fatal || attempt >= max_retries {
                self.events.emit(
                    "autofix/fail",
                    serde_json::json!({ "thread_id": thread_id, "attempt": attempt, "error": failure.to_string() }),
                );
                return Err(AutofixError::Exhausted { attempts_used: attempt + 1, cause: failure });
            }

            let latest = self.saver.get(&CheckpointConfig::latest(thread_id)).await?;
            let parent_checkpoint_id = latest.as_ref().map(|cp| cp.checkpoint_id.clone());
            let messages = extract_messages(latest.as_ref());

            let pre_tokens = self.pruner.count_messages(&messages);
            let error_info = ErrorInfo {
                error_type: "AutofixFailure".to_string(),
                description: failure.to_string(),
            };
            let pruned = self.pruner.prune_for_retry(&messages, &error_info, self.pruner.max_tokens);
            let post_tokens = self.pruner.count_messages(&pruned);
            last_compression_ratio = Some(compression_ratio(pre_tokens, post_tokens));

            self.events.emit(
                "autofix/prune",
                serde_json::json!({
                    "thread_id": thread_id,
                    "attempt": attempt,
                    "pre_tokens": pre_tokens,
                    "post_tokens": post_tokens,
                }),
            );

            let patch = match correction {
                Some(build_patch) => build_patch(&failure, &pruned),
                None => default_patch(&pruned),
            };

            match self.traveler.fork_and_correct(graph, thread_id, 1, patch, "autofix_retry").await {
                Ok(new_config) => {
                    self.events.emit(
                        "autofix/travel",
                        serde_json::json!({
                            "thread_id": thread_id,
                            "attempt": attempt,
                            "parent_checkpoint_id": parent_checkpoint_id,
                            "to_checkpoint_id": new_config.checkpoint_id,
                        }),
                    );
                    current_input = Value::Null;
                    current_config = serde_json::json!({
                        "thread_id": thread_id,
                        "checkpoint_id": new_config.checkpoint_id,
                    });
                }
                Err(_) => {
                    self.events.emit(
                        "autofix/fail",
                        serde_json::json!({ "thread_id": thread_id, "attempt": attempt, "error": failure.to_string() }),
                    );
                    return Err(AutofixError::Exhausted { attempts_used: attempt + 1, cause: failure });
                }
            }

            attempt += 1;
        }
    }

    async fn invoke_and_validate(
        &self,
        graph: &dyn GraphRuntime,
        input: Value,
        config: Value,
        validator: Option<&ValidatorFn>,
    ) -> std::result::Result<Value, AttemptFailure> {
        match graph.ainvoke(input, config).await {
            Ok(value) => match validator {
                Some(validate) if !validate(&value) => {
                    Err(AttemptFailure::Validation("validator rejected result".to_string()))
                }
                _ => Ok(value),
            },
            Err(err) => Err(AttemptFailure::Graph(err.to_string())),
        }
    }
}

fn default_patch(pruned_messages: &[Message]) -> Value {
    serde_json::json!({ "messages": pruned_messages })
}

fn extract_messages(checkpoint: Option<&Checkpoint>) -> Vec<Message> {
    let Some(checkpoint) = checkpoint else { return Vec::new() };
    checkpoint
        .payload
        .get("messages")
        .and_then(|value| serde_json::from_value::<Vec<Message>>(value.clone()).ok())
        .unwrap_or_default()
}

fn compression_ratio(pre_tokens: usize, post_tokens: usize) -> f64 {
    if pre_tokens == 0 {
        1.0
    } else {
        post_tokens as f64 / pre_tokens as f64
    }
}

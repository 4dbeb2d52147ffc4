//! The minimal graph-invocation collaborator the auto-fix loop retries against.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A single-operation view of a compiled graph: invoke it with an input and a
/// config, get back a result value.
///
/// This is intentionally not a full execution engine — no streaming, no
/// interrupts, no checkpointing hooks. The auto-fix loop only ever needs to
/// call a graph and observe whether it succeeded.
#[async_trait]
pub trait GraphRuntime: Send + Sync {
    /// Invoke the graph once and return its output.
    async fn ainvoke(&self, input: Value, config: Value) -> Result<Value>;
}

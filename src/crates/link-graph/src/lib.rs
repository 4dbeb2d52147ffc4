//! Content-addressed note graph: hybrid search, neighbors/related
//! traversal, metadata/TOC/stats, and incremental-or-full refresh.

pub mod engine;
pub mod error;
pub mod model;
pub mod query_parser;
pub mod scan;
pub mod text_index;

pub use engine::{LinkGraphEngine, SearchOutcome};
pub use error::{LinkGraphError, Result};
pub use scan::ScanConfig;

//! Bounded anti-fragile wrapper around graph execution: validate each
//! result, classify failures as `Recoverable` or `Fatal`, and on a
//! recoverable failure prune the thread's messages, fork one checkpoint step
//! back with a correction patch, and retry from the forked state.

pub mod classify;
pub mod error;
pub mod loop_impl;

pub use classify::{classify, Classification};
pub use error::{AttemptFailure, AutofixError, Result};
pub use loop_impl::{AutofixLoop, CorrectionFn, OnAttemptFn, ValidatorFn};

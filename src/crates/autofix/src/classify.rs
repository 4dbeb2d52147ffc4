//! `Recoverable` vs `Fatal` classification at the auto-fix boundary.
//!
//! Collapses the teacher's three-way `ErrorClass::{Transient, Permanent,
//! Unknown}` split into the two-way distinction this loop actually branches
//! on: `Validation` failures and anything not matching a known-fatal marker
//! are `Recoverable`; known-fatal markers (auth, not-found, bad-request
//! style messages) are `Fatal` and are never retried.

use crate::error::AttemptFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Recoverable,
    Fatal,
}

const FATAL_MARKERS: &[&str] = &[
    "401",
    "unauthorized",
    "invalid api key",
    "authentication failed",
    "403",
    "forbidden",
    "access denied",
    "404",
    "not found",
    "400",
    "bad request",
    "invalid request",
];

pub fn classify(failure: &AttemptFailure) -> Classification {
    match failure {
        AttemptFailure::Validation(_) => Classification::Recoverable,
        AttemptFailure::Graph(message) => classify_message(message),
    }
}

fn classify_message(message: &str) -> Classification {
    let lower = message.to_lowercase();
    if FATAL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Classification::Fatal
    } else {
        Classification::Recoverable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_are_always_recoverable() {
        let failure = AttemptFailure::Validation("ok was not true".to_string());
        assert_eq!(classify(&failure), Classification::Recoverable);
    }

    #[test]
    fn unmatched_graph_errors_are_recoverable() {
        let failure = AttemptFailure::Graph("ValueError(\"boom\")".to_string());
        assert_eq!(classify(&failure), Classification::Recoverable);
    }

    #[test]
    fn auth_failures_are_fatal() {
        let failure = AttemptFailure::Graph("401 Unauthorized".to_string());
        assert_eq!(classify(&failure), Classification::Fatal);
    }

    #[test]
    fn not_found_is_fatal() {
        let failure = AttemptFailure::Graph("404 Not Found".to_string());
        assert_eq!(classify(&failure), Classification::Fatal);
    }
}

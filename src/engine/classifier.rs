//! Failure classification
//!
//! The correctness-critical mapping from a structured failure signal to a
//! retry class. Misclassifying a permanent failure as transient wastes
//! retries against a dead endpoint; misclassifying a transient failure as
//! permanent abandons a recoverable item. Both directions are pinned by
//! the test table below.

use serde::{Deserialize, Serialize};

use crate::domain::gateways::FailureKind;

/// Retry class of a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Retrying will never succeed.
    Permanent,
    /// A retry may succeed.
    Transient,
    /// Not confidently either; resolved by the repeat rule in
    /// [`AttemptClassifier`].
    Unknown,
}

/// Pure classification of one failure signal.
///
/// Connection refused is deliberately `Unknown`: a single refusal is often
/// a restarting service, but one repeated across two independent attempts
/// means the port is dead.
#[must_use]
pub fn classify(kind: &FailureKind) -> Classification {
    match kind {
        FailureKind::Dns { .. } | FailureKind::Tls { .. } | FailureKind::InvalidInput { .. } => {
            Classification::Permanent
        }
        FailureKind::HttpStatus { status } => match status {
            404 | 410 | 451 => Classification::Permanent,
            408 | 429 => Classification::Transient,
            500..=599 => Classification::Transient,
            _ => Classification::Unknown,
        },
        FailureKind::Timeout { .. }
        | FailureKind::ConnectionReset
        | FailureKind::QuotaExceeded { .. } => Classification::Transient,
        FailureKind::ConnectionRefused { .. } | FailureKind::Other { .. } => {
            Classification::Unknown
        }
    }
}

/// Per-item classifier that applies the unknown-repeat rule across one
/// item's retry loop.
///
/// `Unknown` failures get one second chance; when the identical failure
/// recurs the item is treated as permanently failed. This keeps
/// unclassified errors from retrying forever while still letting
/// genuinely flaky ones recover.
#[derive(Debug, Default)]
pub struct AttemptClassifier {
    last: Option<FailureKind>,
}

impl AttemptClassifier {
    /// Creates a classifier for one item's retry loop.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies the failure of the latest attempt.
    pub fn assess(&mut self, kind: &FailureKind) -> Classification {
        let effective = match classify(kind) {
            Classification::Unknown => {
                if self.last.as_ref() == Some(kind) {
                    Classification::Permanent
                } else {
                    Classification::Transient
                }
            }
            other => other,
        };
        self.last = Some(kind.clone());
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::dns(FailureKind::Dns { host: "dead.example".into() }, Classification::Permanent)]
    #[case::tls(FailureKind::Tls { detail: "certificate expired".into() }, Classification::Permanent)]
    #[case::not_found(FailureKind::HttpStatus { status: 404 }, Classification::Permanent)]
    #[case::gone(FailureKind::HttpStatus { status: 410 }, Classification::Permanent)]
    #[case::legal(FailureKind::HttpStatus { status: 451 }, Classification::Permanent)]
    #[case::invalid(FailureKind::InvalidInput { detail: "bad url".into() }, Classification::Permanent)]
    #[case::rate_limited(FailureKind::HttpStatus { status: 429 }, Classification::Transient)]
    #[case::server_error(FailureKind::HttpStatus { status: 503 }, Classification::Transient)]
    #[case::timeout(FailureKind::Timeout { seconds: 30 }, Classification::Transient)]
    #[case::reset(FailureKind::ConnectionReset, Classification::Transient)]
    #[case::quota(FailureKind::QuotaExceeded { detail: "daily cap".into() }, Classification::Transient)]
    #[case::refused(FailureKind::ConnectionRefused { host: "x".into() }, Classification::Unknown)]
    #[case::client_error(FailureKind::HttpStatus { status: 403 }, Classification::Unknown)]
    #[case::other(FailureKind::Other { detail: "weird".into() }, Classification::Unknown)]
    fn classification_table(#[case] kind: FailureKind, #[case] expected: Classification) {
        assert_eq!(classify(&kind), expected);
    }

    #[test]
    fn unknown_gets_one_second_chance_then_turns_permanent() {
        let mut classifier = AttemptClassifier::new();
        let kind = FailureKind::Other {
            detail: "unexplained".into(),
        };

        assert_eq!(classifier.assess(&kind), Classification::Transient);
        assert_eq!(classifier.assess(&kind), Classification::Permanent);
    }

    #[test]
    fn refused_twice_on_same_host_is_permanent() {
        let mut classifier = AttemptClassifier::new();
        let kind = FailureKind::ConnectionRefused {
            host: "dead.example".into(),
        };

        assert_eq!(classifier.assess(&kind), Classification::Transient);
        assert_eq!(classifier.assess(&kind), Classification::Permanent);
    }

    #[test]
    fn differing_unknown_failures_keep_retrying() {
        let mut classifier = AttemptClassifier::new();

        let first = FailureKind::Other { detail: "a".into() };
        let second = FailureKind::Other { detail: "b".into() };
        assert_eq!(classifier.assess(&first), Classification::Transient);
        assert_eq!(classifier.assess(&second), Classification::Transient);
    }

    #[test]
    fn known_transient_is_never_promoted_by_repetition() {
        let mut classifier = AttemptClassifier::new();
        let kind = FailureKind::Timeout { seconds: 30 };

        assert_eq!(classifier.assess(&kind), Classification::Transient);
        assert_eq!(classifier.assess(&kind), Classification::Transient);
        assert_eq!(classifier.assess(&kind), Classification::Transient);
    }
}

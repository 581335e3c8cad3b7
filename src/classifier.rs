// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component K: the classifier contract. Individual filters (reputation
//! lookup, DGA detection, YARA scanning, ...) are external collaborators;
//! this runtime only fixes the trait they implement.

use serde_json::Value;

use crate::cache::default_hash;

/// `DARWIN_ERROR_RETURN`: sentinel certitude meaning "processing error for
/// this entry"; never triggers an alert (§6.5).
pub const ERROR_RETURN: u16 = 101;

/// The classifier-supplied half of an alert record; the runtime fills in
/// `evt_id`, `time`, `filter`, and `score` around this (§3.5).
#[derive(Debug, Clone)]
pub struct ClassifierAlert {
    pub rule_name: String,
    pub entry: String,
    pub tags: Option<Vec<String>>,
    pub details: Option<Value>,
}

/// A single classification decision, plus whatever alert the classifier
/// wants raised for it. `alert` is `None` when the entry does not meet the
/// classifier's alerting criteria (independent of the certitude threshold,
/// which the runtime evaluates separately).
pub struct Verdict {
    pub certitude: u16,
    pub alert: Option<ClassifierAlert>,
}

impl Verdict {
    pub fn certitude(certitude: u16) -> Self {
        Self { certitude, alert: None }
    }

    pub fn error() -> Self {
        Self { certitude: ERROR_RETURN, alert: None }
    }
}

/// The contract every filter implementation satisfies (§4.K). `filter_code`
/// identifies the classifier on the wire; `classify` runs once per parsed
/// body entry; `hash_key`/`default_certitude` have runtime-supplied
/// defaults that most classifiers never need to override.
pub trait Classifier: Send + Sync {
    /// Identifier placed in the `filter_code` header field of frames this
    /// classifier emits. `0x00000000` is reserved and must not be used.
    fn filter_code(&self) -> u32;

    /// Classifies one parsed body entry, returning its certitude and an
    /// optional alert record.
    fn classify(&self, entry: &Value) -> Verdict;

    /// Cache key for the current request. Default: hash of the raw request
    /// body bytes (§4.B). Override for classifiers whose equivalence class
    /// over inputs is coarser than byte-identity (e.g. case-folded domain
    /// names).
    fn hash_key(&self, body: &[u8]) -> u64 {
        default_hash(body)
    }

    /// Certitude returned for an empty-body control frame (§8 boundary
    /// behaviour: defaults to 0, "benign"/no opinion).
    fn default_certitude(&self) -> u16 {
        0
    }
}

/// Reference classifier used by the runtime's own tests and as a worked
/// example for new filter implementations: certitude is simply `100` when
/// the entry (stringified) contains the substring `"bad"`, else `0`.
pub struct EchoClassifier {
    code: u32,
}

impl EchoClassifier {
    pub fn new(code: u32) -> Self {
        Self { code }
    }
}

impl Classifier for EchoClassifier {
    fn filter_code(&self) -> u32 {
        self.code
    }

    fn classify(&self, entry: &Value) -> Verdict {
        let flagged = entry.as_str().is_some_and(|s| s.contains("bad"));
        Verdict::certitude(if flagged { 100 } else { 0 })
    }
}

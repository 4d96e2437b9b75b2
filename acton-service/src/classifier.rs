//! Request classification: turn free text (or any request body) into a
//! `(org, service)` target plus a confidence score.
//!
//! The procedure is the closed sum type the spec's redesign flags call for
//! (§9): a classification is either a deterministic rule match, a scored
//! keyword match, or the fallback. No duck-typed dict scoring survives here.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::registry::Registry;

/// Bound on the ring buffer of past classifications kept for introspection.
/// Trimmed to half (§8 property 10) once it hits this cap.
const HISTORY_CAP: usize = 1000;

/// The fallback target named by the spec when nothing matches (§4.2.3).
pub const FALLBACK_ORG: &str = "AI";
pub const FALLBACK_SERVICE: &str = "router";
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Which branch of the classification procedure produced a result. Kept as
/// a closed enum (rather than a generic `confidence` + `patterns` bag) so
/// tests can assert exactly which path fired.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A routing rule regex matched; `rule_pattern` and `priority` identify
    /// which one, for introspection and the `patterns` field on the wire.
    ByRule {
        org: String,
        service: String,
        confidence: f64,
        rule_pattern: String,
        priority: i32,
    },
    /// No rule matched; keyword scoring picked a category.
    ByScore {
        org: String,
        service: String,
        confidence: f64,
        category: String,
        scores: HashMap<String, f64>,
    },
    /// Neither a rule nor any category scored above zero.
    Fallback,
}

impl Classification {
    pub fn org(&self) -> &str {
        match self {
            Classification::ByRule { org, .. } => org,
            Classification::ByScore { org, .. } => org,
            Classification::Fallback => FALLBACK_ORG,
        }
    }

    pub fn service(&self) -> &str {
        match self {
            Classification::ByRule { service, .. } => service,
            Classification::ByScore { service, .. } => service,
            Classification::Fallback => FALLBACK_SERVICE,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Classification::ByRule { confidence, .. } => *confidence,
            Classification::ByScore { confidence, .. } => *confidence,
            Classification::Fallback => FALLBACK_CONFIDENCE,
        }
    }

    /// The patterns/categories that contributed, for the wire response and
    /// for tests (§3 `Classification.patterns`).
    pub fn patterns(&self) -> Vec<String> {
        match self {
            Classification::ByRule { rule_pattern, .. } => vec![rule_pattern.clone()],
            Classification::ByScore { category, .. } => vec![category.clone()],
            Classification::Fallback => vec![],
        }
    }
}

/// Lowercase, collapse consecutive whitespace, and drop a bounded set of
/// punctuation for keyword scoring. Regex rules run against the raw text
/// instead (§4.2): they get their own case-insensitivity from the compiled
/// pattern, not from this normalization.
pub fn normalize_for_scoring(text: &str) -> String {
    const STRIP: &[char] = &[',', '.', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']'];
    let lowered = text.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| !STRIP.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run the classification procedure against the current registry snapshot.
///
/// 1. Highest-priority matching rule wins (ties broken by declaration order,
///    already encoded in `Registry::rules`' sort).
/// 2. Else, keyword scoring per category; highest score wins, ties broken by
///    declaration order of categories in the registry file.
/// 3. Else, the fallback.
pub fn classify(registry: &Registry, text: &str) -> Classification {
    for (rank, rule) in registry.rules.iter().enumerate() {
        if rule.regex.is_match(text) {
            // Confidence climbs with priority but never exceeds 1.0; `rank`
            // only affects how quickly it saturates, never which rule wins
            // (that's already decided by the registry's sort order).
            let confidence = (0.5 + 0.1 * (rank as f64 + 1.0)).min(1.0);
            return Classification::ByRule {
                org: rule.org.clone(),
                service: rule.service.clone(),
                confidence,
                rule_pattern: rule.pattern.clone(),
                priority: rule.priority,
            };
        }
    }

    let normalized = normalize_for_scoring(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut best: Option<(usize, f64)> = None; // (declaration index, score)

    for (index, category) in registry.categories.iter().enumerate() {
        if category.keywords.is_empty() {
            continue;
        }
        let matches = category
            .keywords
            .iter()
            .filter(|kw| {
                let kw = kw.to_lowercase();
                words.iter().any(|w| *w == kw) || normalized.contains(&kw)
            })
            .count();
        let score = (matches as f64 / category.keywords.len() as f64).min(1.0);
        scores.insert(category.name.clone(), score);

        if score > 0.0 {
            match best {
                // Higher score wins; on a tie the earlier declaration wins
                // (stable category order is part of the registry, §4.2/§9).
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }
    }

    match best {
        Some((index, score)) => {
            let category = &registry.categories[index];
            Classification::ByScore {
                org: category.org.clone(),
                service: category.service.clone(),
                confidence: score,
                category: category.name.clone(),
                scores,
            }
        }
        None => Classification::Fallback,
    }
}

/// A bounded ring buffer of past classifications plus the stateless
/// classification procedure. The classifier itself has no memory; this
/// wrapper is the "router" keeping `history` for `stats` introspection
/// (§4.2 state machine).
pub struct Router {
    history: Mutex<VecDeque<Classification>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Classify `text` against `registry` and record it in history.
    pub fn classify(&self, registry: &Registry, text: &str) -> Classification {
        let result = classify(registry, text);
        self.record(result.clone());
        result
    }

    fn record(&self, classification: Classification) {
        let mut history = self.history.lock().expect("classifier history poisoned");
        history.push_back(classification);
        if history.len() > HISTORY_CAP {
            let keep = HISTORY_CAP / 2;
            let drop = history.len() - keep;
            for _ in 0..drop {
                history.pop_front();
            }
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().expect("classifier history poisoned").len()
    }

    /// Counts of classifications by org, for `stats` introspection.
    pub fn stats_by_org(&self) -> HashMap<String, usize> {
        let history = self.history.lock().expect("classifier history poisoned");
        let mut counts = HashMap::new();
        for classification in history.iter() {
            *counts.entry(classification.org().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    const DOC: &str = r#"
default_org = "AI"

[orgs.OS]
name = "Operating System"
status = "active"
[orgs.OS.services.core]
endpoint = "http://os-core.internal"
default = true

[orgs.FND]
name = "Foundation"
status = "active"
[orgs.FND.services.salesforce]
endpoint = "http://fnd-salesforce.internal"
default = true

[orgs.AI]
name = "Artificial Intelligence"
status = "active"
[orgs.AI.services.router]
endpoint = "http://ai-router.internal"
default = true

[[rules]]
pattern = "salesforce"
org = "FND"
service = "salesforce"
priority = 10

[[categories]]
name = "crm"
org = "FND"
service = "salesforce"
keywords = ["contacts", "lead", "deal", "crm"]
"#;

    fn registry() -> registry::Registry {
        registry::parse(DOC).unwrap()
    }

    #[test]
    fn rule_match_is_deterministic_and_confident() {
        let r = registry();
        let result = classify(&r, "Please sync our Salesforce leads");
        match result {
            Classification::ByRule { org, service, confidence, .. } => {
                assert_eq!(org, "FND");
                assert_eq!(service, "salesforce");
                assert!(confidence >= 0.5 && confidence <= 1.0);
            }
            other => panic!("expected ByRule, got {other:?}"),
        }
    }

    #[test]
    fn scenario_1_salesforce_crm_sync() {
        let r = registry();
        let result = classify(&r, "Sync Salesforce contacts to the CRM");
        assert_eq!(result.org(), "FND");
        assert_eq!(result.service(), "salesforce");
        assert!(result.confidence() >= 0.6);
    }

    #[test]
    fn keyword_scoring_wins_when_no_rule_matches() {
        let r = registry();
        let result = classify(&r, "update lead and deal records in the crm");
        match result {
            Classification::ByScore { org, service, .. } => {
                assert_eq!(org, "FND");
                assert_eq!(service, "salesforce");
            }
            other => panic!("expected ByScore, got {other:?}"),
        }
    }

    #[test]
    fn scenario_2_fallback_on_no_match() {
        let r = registry();
        let result = classify(&r, "qwerty asdf");
        assert_eq!(result, Classification::Fallback);
        assert_eq!(result.org(), FALLBACK_ORG);
        assert_eq!(result.service(), FALLBACK_SERVICE);
        assert_eq!(result.confidence(), FALLBACK_CONFIDENCE);
    }

    #[test]
    fn empty_input_is_fallback_not_an_error() {
        let r = registry();
        let result = classify(&r, "");
        assert_eq!(result, Classification::Fallback);
    }

    #[test]
    fn confidence_is_always_bounded() {
        let r = registry();
        for text in ["salesforce", "lead deal crm", "", "xyz"] {
            let confidence = classify(&r, text).confidence();
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn history_trims_to_half_when_cap_exceeded() {
        let r = registry();
        let router = Router::new();
        for _ in 0..(HISTORY_CAP + 10) {
            router.classify(&r, "qwerty");
        }
        // Trim fires once, at the push that takes the buffer past the cap,
        // bringing it to half; the remaining 9 pushes land on top of that.
        assert!(router.history_len() <= HISTORY_CAP);
        assert_eq!(router.history_len(), HISTORY_CAP / 2 + 9);
    }

    #[test]
    fn higher_priority_rule_wins_when_both_match() {
        let doc = DOC.replace(
            "[[rules]]\npattern = \"salesforce\"\norg = \"FND\"\nservice = \"salesforce\"\npriority = 10",
            "[[rules]]\npattern = \"salesforce\"\norg = \"FND\"\nservice = \"salesforce\"\npriority = 10\n\n[[rules]]\npattern = \"force\"\norg = \"OS\"\nservice = \"core\"\npriority = 1",
        );
        let r = registry::parse(&doc).unwrap();
        let result = classify(&r, "salesforce sync");
        assert_eq!(result.org(), "FND");
    }
}

//! Result interpretation policy.
//!
//! Turns ranked candidates and their scores into a display decision:
//! which action the presentation layer takes, how many results get
//! highlighted, whether the map zooms to them, and the status message.
//! Per-query outcomes (no results, low similarity) are normal decisions
//! here, never errors.

use serde::{Deserialize, Serialize};

use crate::memories::Memory;
use crate::retrieval::Candidate;

/// What the presentation layer should do with one query's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ShowSearchResults,
    ShowAllMemories,
}

/// Structured outcome of one query, consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub message: String,
    pub highlight_count: usize,
    pub show_search_results: bool,
    pub zoom_to_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

/// Axis-aligned bounding box over candidate coordinates, used by the
/// presentation layer to set the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Coarse query intent, detected by keyword membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Location,
    Activity,
    Emotion,
    Time,
    Visual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub query: String,
    pub detected_intents: Vec<Intent>,
    pub has_specific_intent: bool,
}

const INTENT_KEYWORDS: [(Intent, &[&str]); 5] = [
    (Intent::Location, &["where", "place", "location", "city", "country"]),
    (Intent::Activity, &["trip", "vacation", "visit", "went", "travel"]),
    (Intent::Emotion, &["happy", "sad", "beautiful", "amazing", "wonderful"]),
    (Intent::Time, &["recent", "old", "last", "first", "when"]),
    (Intent::Visual, &["photo", "picture", "click", "image", "shot"]),
];

/// Decision policy. Stateless per query; only the two configuration
/// knobs persist across calls.
#[derive(Debug, Clone)]
pub struct Policy {
    default_top_n: usize,
    similarity_threshold: f32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            default_top_n: 3,
            similarity_threshold: 0.0,
        }
    }
}

impl Policy {
    /// Both values pass through the clamping setters, so a policy never
    /// holds an out-of-range configuration.
    pub fn new(default_top_n: usize, similarity_threshold: f32) -> Self {
        let mut policy = Self::default();
        policy.set_default_top_n(default_top_n);
        policy.set_similarity_threshold(similarity_threshold);
        policy
    }

    pub fn default_top_n(&self) -> usize {
        self.default_top_n
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Clamped to [0.0, 1.0].
    pub fn set_similarity_threshold(&mut self, threshold: f32) {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Clamped to at least 1.
    pub fn set_default_top_n(&mut self, top_n: usize) {
        self.default_top_n = top_n.max(1);
    }

    /// Decide what to do with one query's ranked candidates.
    pub fn decide(&self, query: &str, candidates: &[Candidate]) -> Decision {
        if candidates.is_empty() {
            return self.decide_no_results(query);
        }

        let kept = self.filter_by_similarity(candidates);

        if kept.is_empty() {
            return self.decide_low_similarity(query);
        }

        self.decide_show_results(query, kept.len())
    }

    /// Keep only candidates at or above the similarity threshold,
    /// preserving the incoming rank order.
    pub fn filter_by_similarity(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .filter(|c| c.score >= self.similarity_threshold)
            .copied()
            .collect()
    }

    fn decide_no_results(&self, query: &str) -> Decision {
        Decision {
            action: Action::ShowAllMemories,
            message: format!(
                "No specific memories found for '{query}'. Showing all memories on the map."
            ),
            highlight_count: 0,
            show_search_results: false,
            zoom_to_results: false,
            top_n: None,
        }
    }

    fn decide_low_similarity(&self, query: &str) -> Decision {
        Decision {
            action: Action::ShowAllMemories,
            message: format!(
                "No closely matching memories found for '{query}'. Showing all memories on the map."
            ),
            highlight_count: 0,
            show_search_results: false,
            zoom_to_results: false,
            top_n: None,
        }
    }

    fn decide_show_results(&self, query: &str, kept_count: usize) -> Decision {
        let top_n = self.default_top_n.min(kept_count);

        Decision {
            action: Action::ShowSearchResults,
            message: format!("Showing top {top_n} similar memories for: '{query}'"),
            highlight_count: top_n,
            show_search_results: true,
            zoom_to_results: true,
            top_n: Some(top_n),
        }
    }
}

/// Bounding box over the candidates' coordinates, `None` when there are
/// no candidates to frame.
pub fn determine_bounds(memories: &[Memory]) -> Option<Bounds> {
    let first = memories.first()?;

    let mut bounds = Bounds {
        min_lat: first.latitude,
        min_lon: first.longitude,
        max_lat: first.latitude,
        max_lon: first.longitude,
    };

    for memory in &memories[1..] {
        bounds.min_lat = bounds.min_lat.min(memory.latitude);
        bounds.max_lat = bounds.max_lat.max(memory.latitude);
        bounds.min_lon = bounds.min_lon.min(memory.longitude);
        bounds.max_lon = bounds.max_lon.max(memory.longitude);
    }

    Some(bounds)
}

/// Keyword-membership intent classifier. Case-insensitive substring
/// match against fixed keyword groups; deterministic, no model involved.
pub fn analyze_intent(query: &str) -> IntentAnalysis {
    let query_lower = query.to_lowercase();

    let detected_intents: Vec<Intent> = INTENT_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| query_lower.contains(kw)))
        .map(|(intent, _)| *intent)
        .collect();

    IntentAnalysis {
        query: query.to_string(),
        has_specific_intent: !detected_intents.is_empty(),
        detected_intents,
    }
}

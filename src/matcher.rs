// 🔍 Name Matcher - find an individual's folder inside a parish
//
// Scope: Parish or Sub-Parish folders whose name matches the roster's parish
// (normalized equality first, fuzzy fallback). Candidates: Individual folders
// in that subtree. Best score wins if score >= threshold; ties go to the
// shortest path, then to path order.

use crate::error::OrganizerError;
use crate::hierarchy::{HierarchyCache, HierarchyLevel, HierarchyNode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Default acceptance threshold
pub const DEFAULT_THRESHOLD: f64 = 0.8;

// ============================================================================
// MATCH CANDIDATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Cache key of the individual folder
    pub folder_path: String,

    /// Similarity in [0, 1]
    pub similarity_score: f64,
}

impl MatchCandidate {
    /// Folder name (last path component)
    pub fn folder_name(&self) -> &str {
        self.folder_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.folder_path)
    }

    /// Ranking: higher score, then shorter path, then path order
    fn rank(&self, other: &Self) -> Ordering {
        other
            .similarity_score
            .total_cmp(&self.similarity_score)
            .then_with(|| {
                self.folder_path
                    .chars()
                    .count()
                    .cmp(&other.folder_path.chars().count())
            })
            .then_with(|| self.folder_path.cmp(&other.folder_path))
    }
}

// ============================================================================
// MATCH FAILURE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MatchFailure {
    EmptyName,

    /// No Parish or Sub-Parish folder carries the roster's parish name
    ParishNotFound,

    NoIndividualFolders,

    /// Closest folder, still under the threshold
    BelowThreshold { best: MatchCandidate, threshold: f64 },
}

impl MatchFailure {
    pub fn into_error(self, individual: &str, parish: &str) -> OrganizerError {
        OrganizerError::UnresolvedMatch {
            individual: individual.to_string(),
            parish: parish.to_string(),
            reason: self.to_string(),
        }
    }
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::EmptyName => write!(f, "empty individual name"),
            MatchFailure::ParishNotFound => write!(f, "parish not found in hierarchy"),
            MatchFailure::NoIndividualFolders => write!(f, "parish has no individual folders"),
            MatchFailure::BelowThreshold { best, threshold } => write!(
                f,
                "best candidate '{}' scored {:.2}, below {:.2}",
                best.folder_name(),
                best.similarity_score,
                threshold
            ),
        }
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Similarity between a roster name and a folder name, in [0, 1]
pub trait NameScorer {
    fn score(&self, query: &str, candidate: &str) -> f64;
}

/// Token-set ratio: word order and extra words on one side don't count
/// against a match. "Smith John" vs "John Smith" = 1.0,
/// "John Smith" vs "John Smith (Deceased)" = 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetScorer;

impl NameScorer for TokenSetScorer {
    fn score(&self, query: &str, candidate: &str) -> f64 {
        token_set_ratio(query, candidate)
    }
}

fn tokens(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn join_tokens<'a>(parts: impl Iterator<Item = &'a String>) -> String {
    parts.map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = tokens(a);
    let tokens_b = tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let common = join_tokens(tokens_a.intersection(&tokens_b));
    let only_a = join_tokens(tokens_a.difference(&tokens_b));
    let only_b = join_tokens(tokens_b.difference(&tokens_a));

    let combined_a = format!("{} {}", common, only_a).trim().to_string();
    let combined_b = format!("{} {}", common, only_b).trim().to_string();

    let ratio = |x: &str, y: &str| {
        if x.is_empty() || y.is_empty() {
            0.0
        } else {
            strsim::normalized_levenshtein(x, y)
        }
    };

    ratio(&common, &combined_a)
        .max(ratio(&common, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Lowercase, collapse whitespace
pub fn normalize_name(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// NAME MATCHER
// ============================================================================

pub struct NameMatcher {
    /// Minimum accepted score (inclusive)
    pub threshold: f64,

    scorer: Box<dyn NameScorer>,
}

impl NameMatcher {
    pub fn new() -> Self {
        NameMatcher {
            threshold: DEFAULT_THRESHOLD,
            scorer: Box::new(TokenSetScorer),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scorer(mut self, scorer: Box<dyn NameScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Best individual folder for `individual_name` under `parish_scope`, if any
    pub fn resolve(
        &self,
        individual_name: &str,
        parish_scope: &str,
        cache: &HierarchyCache,
    ) -> Option<MatchCandidate> {
        self.try_resolve(individual_name, parish_scope, cache).ok()
    }

    /// Like `resolve`, but says why nothing matched
    pub fn try_resolve(
        &self,
        individual_name: &str,
        parish_scope: &str,
        cache: &HierarchyCache,
    ) -> Result<MatchCandidate, MatchFailure> {
        if individual_name.trim().is_empty() {
            return Err(MatchFailure::EmptyName);
        }

        let scopes = self.resolve_scope(parish_scope, cache);
        if scopes.is_empty() {
            return Err(MatchFailure::ParishNotFound);
        }

        let mut candidates = self.candidates(individual_name, &scopes, cache);
        if candidates.is_empty() {
            return Err(MatchFailure::NoIndividualFolders);
        }

        candidates.sort_by(|a, b| a.rank(b));
        let best = candidates.swap_remove(0);

        if best.similarity_score >= self.threshold {
            tracing::debug!(
                "Matched '{}' → {} ({:.2})",
                individual_name,
                best.folder_path,
                best.similarity_score
            );
            Ok(best)
        } else {
            Err(MatchFailure::BelowThreshold {
                best,
                threshold: self.threshold,
            })
        }
    }

    /// Parish or Sub-Parish nodes named `parish_scope`.
    ///
    /// Exact (normalized) names win; otherwise the single best fuzzy
    /// match at or above the threshold.
    pub fn resolve_scope<'c>(
        &self,
        parish_scope: &str,
        cache: &'c HierarchyCache,
    ) -> Vec<&'c HierarchyNode> {
        let wanted = normalize_name(parish_scope);
        if wanted.is_empty() {
            return Vec::new();
        }

        let scope_nodes = || {
            cache.nodes().filter(|n| {
                matches!(n.level, HierarchyLevel::Parish | HierarchyLevel::SubParish)
            })
        };

        let exact: Vec<&HierarchyNode> = scope_nodes()
            .filter(|n| normalize_name(n.name()) == wanted)
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let mut fuzzy: Vec<MatchCandidate> = scope_nodes()
            .map(|n| MatchCandidate {
                folder_path: n.path.clone(),
                similarity_score: self.scorer.score(parish_scope, n.name()),
            })
            .filter(|c| c.similarity_score >= self.threshold)
            .collect();
        fuzzy.sort_by(|a, b| a.rank(b));

        match fuzzy.first() {
            Some(best) => {
                tracing::debug!(
                    "Parish '{}' resolved fuzzily to {} ({:.2})",
                    parish_scope,
                    best.folder_path,
                    best.similarity_score
                );
                cache.get(&best.folder_path).into_iter().collect()
            }
            None => Vec::new(),
        }
    }

    fn candidates(
        &self,
        individual_name: &str,
        scopes: &[&HierarchyNode],
        cache: &HierarchyCache,
    ) -> Vec<MatchCandidate> {
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();

        for scope in scopes {
            for node in cache.descendants_at(&scope.path, HierarchyLevel::Individual) {
                // A sub-parish scope can sit inside a parish scope
                if !seen.insert(node.path.as_str()) {
                    continue;
                }
                candidates.push(MatchCandidate {
                    folder_path: node.path.clone(),
                    similarity_score: self.scorer.score(individual_name, node.name()),
                });
            }
        }

        candidates
    }
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Deterministic multi-factor ranking of candidates against historical
//! metadata.
//!
//! | factor | weight |
//! |---|---|
//! | tag match | 20 |
//! | text similarity | 20 |
//! | attribute similarity (`name`, `type`, `placeholder`, `role`, `aria-label`) | 20 |
//! | parent tag match | 10 |
//! | class overlap (Jaccard) | 10 |
//! | location proximity | 10 |
//! | color match | 5 |
//! | neighbor signature overlap | 5 |
use heal_common::dom::{CandidateElement, Rect};
use heal_common::{ElementDefinition, HistoricalMetadata, Location};
use std::collections::{BTreeSet, HashMap};

const TAG_WEIGHT: f64 = 20.0;
const TEXT_WEIGHT: f64 = 20.0;
const ATTRIBUTE_WEIGHT: f64 = 20.0;
const PARENT_WEIGHT: f64 = 10.0;
const CLASS_WEIGHT: f64 = 10.0;
const LOCATION_WEIGHT: f64 = 10.0;
const COLOR_WEIGHT: f64 = 5.0;
const NEIGHBOR_WEIGHT: f64 = 5.0;

const COMPARED_ATTRIBUTES: [&str; 5] = ["name", "type", "placeholder", "role", "aria-label"];
const LOCATION_FALLOFF_PX: f64 = 1000.0;

/// Score every candidate and sort descending; ties keep extraction order.
pub fn score_candidates(
    definition: &ElementDefinition,
    candidates: Vec<CandidateElement>,
) -> Vec<CandidateElement> {
    let metadata = &definition.historical_metadata;
    let mut scored: Vec<CandidateElement> = candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.heuristic_score = round4(score(metadata, &candidate));
            candidate
        })
        .collect();
    scored.sort_by(|a, b| b.heuristic_score.total_cmp(&a.heuristic_score));
    scored
}

/// Unrounded weighted score of one candidate.
pub fn score(metadata: &HistoricalMetadata, candidate: &CandidateElement) -> f64 {
    let mut total = 0.0;
    if let Some(tag) = metadata.tag.as_deref().filter(|t| !t.is_empty()) {
        if candidate.tag == tag {
            total += TAG_WEIGHT;
        }
    }
    total += TEXT_WEIGHT * similarity(metadata.text.as_deref().unwrap_or(""), &candidate.text);
    total += ATTRIBUTE_WEIGHT * attribute_similarity(metadata, candidate);
    if candidate.parent_tag == metadata.parent_tag {
        total += PARENT_WEIGHT;
    }
    total += CLASS_WEIGHT
        * class_overlap(
            metadata.attributes.get("class").map(String::as_str).unwrap_or(""),
            candidate.class_attr(),
        );
    total += LOCATION_WEIGHT * location_proximity(metadata.location, candidate.rect);
    total += COLOR_WEIGHT * color_match(&metadata.color, &candidate.styles.color);
    total += NEIGHBOR_WEIGHT * neighbor_overlap(&metadata.neighbor_signature, candidate);
    total
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Case-insensitive character-sequence similarity in `[0, 1]`.
///
/// ```
/// use heal_core::scoring::similarity;
///
/// assert_eq!(similarity("", ""), 1.0);
/// assert_eq!(similarity("Login", ""), 0.0);
/// assert_eq!(similarity("abcd", "BCDE"), 0.75);
/// ```
pub fn similarity(left: &str, right: &str) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = left.to_lowercase().chars().collect();
    let b: Vec<char> = right.to_lowercase().chars().collect();
    let matched = SequenceMatcher::new(&a, &b).matched_chars();
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn attribute_similarity(metadata: &HistoricalMetadata, candidate: &CandidateElement) -> f64 {
    let sum: f64 = COMPARED_ATTRIBUTES
        .iter()
        .map(|key| {
            similarity(
                metadata.attributes.get(*key).map(String::as_str).unwrap_or(""),
                candidate.attributes.get(*key).map(String::as_str).unwrap_or(""),
            )
        })
        .sum();
    sum / COMPARED_ATTRIBUTES.len() as f64
}

fn class_overlap(expected: &str, actual: &str) -> f64 {
    let left: BTreeSet<&str> = expected.split_whitespace().collect();
    let right: BTreeSet<&str> = actual.split_whitespace().collect();
    match (left.is_empty(), right.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        _ => left.intersection(&right).count() as f64 / left.union(&right).count() as f64,
    }
}

fn location_proximity(expected: Option<Location>, actual: Option<Rect>) -> f64 {
    let (Some(expected), Some(actual)) = (expected, actual) else {
        return 0.0;
    };
    let delta = (expected.x - actual.x).abs() + (expected.y - actual.y).abs();
    (1.0 - (delta / LOCATION_FALLOFF_PX).min(1.0)).max(0.0)
}

fn color_match(expected: &str, actual: &str) -> f64 {
    let (expected, actual) = (expected.trim(), actual.trim());
    if !expected.is_empty() && !actual.is_empty() && expected == actual {
        1.0
    } else {
        0.0
    }
}

fn neighbor_overlap(neighbors: &[String], candidate: &CandidateElement) -> f64 {
    let expected: BTreeSet<&str> = neighbors.iter().map(String::as_str).collect();
    if expected.is_empty() {
        return 0.0;
    }
    let local: BTreeSet<&str> = [candidate.parent_tag.as_str(), candidate.tag.as_str()]
        .into_iter()
        .collect();
    expected.intersection(&local).count() as f64 / expected.len() as f64
}

/// Longest-matching-block sequence matcher, including the "popular element"
/// heuristic for sequences of 200 or more items.
struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    const AUTOJUNK_MIN_LEN: usize = 200;

    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, ch) in b.iter().enumerate() {
            b2j.entry(*ch).or_default().push(j);
        }
        let n = b.len();
        if n >= Self::AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, indices| indices.len() <= ntest);
        }
        Self { a, b, b2j }
    }

    /// Total length of all matching blocks.
    fn matched_chars(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (a, b) = (self.a, self.b);
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(indices) = self.b2j.get(ch) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        // Popular characters never seed a match but may extend one.
        while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }
        (best_i, best_j, best_size)
    }
}

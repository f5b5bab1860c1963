//! Conversion from model probabilities to the integer scores the store keeps.

/// fastText prefixes every label with this; the workers deal in bare codes.
const LABEL_PREFIX: &str = "__label__";

/// Strip the fastText label prefix, leaving the bare language code.
pub fn bare_code(label: &str) -> &str {
    label.strip_prefix(LABEL_PREFIX).unwrap_or(label)
}

/// Convert a model probability to an integer score, clamped to 0..=100.
/// Garbage probabilities (NaN, out of range) degrade to the nearest bound.
pub fn to_score(prob: f32) -> i16 {
    let scaled = (prob * 100.0).round();
    scaled.clamp(0.0, 100.0) as i16
}

/// The score for `target` within one ranking. A language the model did not
/// mention at all scores 0.
pub fn target_score(ranking: &[(String, f32)], target: &str) -> i16 {
    ranking
        .iter()
        .find(|(code, _)| code.as_str() == target)
        .map(|(_, prob)| to_score(*prob))
        .unwrap_or(0)
}

//! Surface-signal extraction over a single seller utterance.
//!
//! Everything here is keyword matching on the lowercased text. No state, no IO.

use serde::{Deserialize, Serialize};

use crate::domain::Slide;

pub const HEDGE_TERMS: [&str; 3] = ["maybe", "i think", "probably"];
pub const JARGON_TERMS: [&str; 3] = ["kubernetes", "microservices", "ci/cd"];
pub const EXAMPLE_MARKERS: [&str; 2] = ["for example", "such as"];
pub const CLOUD_NATIVE_TERM: &str = "cloud-native";

pub const BRIEF_WORD_LIMIT: usize = 10;
pub const STRONG_MIN_CHARS: usize = 100;
pub const RED_FLAG_PREFIX_CHARS: usize = 20;
pub const OBJECTION_PREFIX_CHARS: usize = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub hedging: bool,
    pub hedge_terms: Vec<String>,
    pub jargon: bool,
    pub jargon_terms: Vec<String>,
    pub brief: bool,
    /// Full text of the first red flag whose prefix appears in the utterance.
    pub red_flag: Option<String>,
    pub has_digit: bool,
    pub has_example_marker: bool,
    /// Long answer backed by a number or an example.
    pub strength: bool,
    pub objection_addressed: bool,
    pub mentions_cloud_native: bool,
    pub word_count: usize,
    pub char_count: usize,
}

impl FeatureSet {
    pub fn red_flag_collision(&self) -> bool {
        self.red_flag.is_some()
    }
}

fn lowered_prefix(text: &str, chars: usize) -> String {
    text.trim().to_lowercase().chars().take(chars).collect()
}

fn prefix_collision<'a>(lower: &str, candidates: &'a [String], chars: usize) -> Option<&'a String> {
    candidates.iter().find(|candidate| {
        let prefix = lowered_prefix(candidate, chars);
        !prefix.is_empty() && lower.contains(&prefix)
    })
}

fn matched_terms(lower: &str, terms: &[&str]) -> Vec<String> {
    terms
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

/// Scan `utterance` against the current slide's red flags and objections.
pub fn extract(utterance: &str, slide: &Slide) -> FeatureSet {
    let lower = utterance.to_lowercase();
    let word_count = utterance.split_whitespace().count();
    let char_count = utterance.chars().count();

    let hedge_terms = matched_terms(&lower, &HEDGE_TERMS);
    let jargon_terms = matched_terms(&lower, &JARGON_TERMS);
    let has_digit = utterance.chars().any(|c| c.is_ascii_digit());
    let has_example_marker = EXAMPLE_MARKERS.iter().any(|m| lower.contains(m));

    let red_flag = prefix_collision(&lower, &slide.red_flags, RED_FLAG_PREFIX_CHARS).cloned();
    let objection_addressed =
        prefix_collision(&lower, &slide.potential_objections, OBJECTION_PREFIX_CHARS).is_some();

    FeatureSet {
        hedging: !hedge_terms.is_empty(),
        hedge_terms,
        jargon: !jargon_terms.is_empty(),
        jargon_terms,
        brief: word_count < BRIEF_WORD_LIMIT,
        red_flag,
        has_digit,
        has_example_marker,
        strength: char_count > STRONG_MIN_CHARS && (has_digit || has_example_marker),
        objection_addressed,
        mentions_cloud_native: lower.contains(CLOUD_NATIVE_TERM),
        word_count,
        char_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;

    fn slide() -> Slide {
        sample_catalog().remove(0)
    }

    #[test]
    fn hedging_is_case_insensitive() {
        let features = extract("MAYBE we should look at this, I Think", &slide());
        assert!(features.hedging);
        assert_eq!(features.hedge_terms, vec!["maybe", "i think"]);
    }

    #[test]
    fn brevity_counts_words_strictly_below_ten() {
        let nine = "one two three four five six seven eight nine";
        let ten = "one two three four five six seven eight nine ten";
        assert!(extract(nine, &slide()).brief);
        assert!(!extract(ten, &slide()).brief);
        assert!(extract("", &slide()).brief);
    }

    #[test]
    fn red_flag_collision_reports_full_flag_text() {
        let features = extract(
            "Honestly we avoid dismissing their worries entirely, trust me on that",
            &slide(),
        );
        assert_eq!(features.red_flag.as_deref(), Some("Avoid dismissing their concerns"));
    }

    #[test]
    fn blank_red_flags_never_collide() {
        let mut slide = slide();
        slide.red_flags = vec!["   ".to_string()];
        assert!(!extract("anything at all goes here", &slide).red_flag_collision());
    }

    #[test]
    fn strength_needs_length_and_evidence() {
        let long_with_digit = "We cut hosting spend by 30 percent across four regions within the first two quarters of the engagement last year.";
        let long_without = "We cut hosting spend dramatically across several regions within the first couple of quarters of the engagement last year.";
        assert!(extract(long_with_digit, &slide()).strength);
        assert!(!extract(long_without, &slide()).strength);
        assert!(!extract("We saved 30 percent.", &slide()).strength);
    }

    #[test]
    fn objection_prefix_marks_address() {
        let features = extract(
            "You might ask what are the risks here, and the answer is phased cutover.",
            &slide(),
        );
        assert!(features.objection_addressed);
    }

    #[test]
    fn jargon_flagged_regardless_of_audience() {
        let features = extract("We run everything on Kubernetes with CI/CD", &slide());
        assert!(features.jargon);
        assert_eq!(features.jargon_terms, vec!["kubernetes", "ci/cd"]);
    }
}

use crate::domain::Sentiment;

const CHALLENGING_WORDS: [&str; 7] = [
    "weak",
    "stop",
    "wrong",
    "try again",
    "not good enough",
    "surface-level",
    "mediocre",
];

const SUPPORTIVE_WORDS: [&str; 7] = [
    "good",
    "excellent",
    "solid",
    "well done",
    "exactly",
    "perfect",
    "great",
];

/// Tag generated coach text by lexicon. Mixed or absent signals are neutral.
pub fn classify(content: &str) -> Sentiment {
    let lower = content.to_lowercase();
    let challenging = CHALLENGING_WORDS.iter().any(|w| lower.contains(w));
    let supportive = SUPPORTIVE_WORDS.iter().any(|w| lower.contains(w));

    match (challenging, supportive) {
        (true, false) => Sentiment::Challenging,
        (false, true) => Sentiment::Supportive,
        _ => Sentiment::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sided_signals() {
        assert_eq!(classify("Weak. Try again."), Sentiment::Challenging);
        assert_eq!(classify("Excellent framing."), Sentiment::Supportive);
    }

    #[test]
    fn mixed_or_missing_signals_are_neutral() {
        assert_eq!(classify("Good start, but that ending was weak."), Sentiment::Neutral);
        assert_eq!(classify("Tell me about the timeline."), Sentiment::Neutral);
    }
}

//! Query depth detection

use crate::parser::{QueryIntent, Stimulus};
use crate::retrieval::types::DepthLevel;

/// Words that signal the query is about ordering of events
const SEQUENCE_KEYWORDS: &[&str] = &["before", "after", "then", "next", "first", "later"];

/// Pick a depth from the query's intent and wording.
///
/// - Why / feeling questions explore deeply
/// - Pattern questions look for habits
/// - How / compare questions and sequencing words need context
/// - Everything else is answered instantly
pub fn detect_depth(stimulus: &Stimulus) -> DepthLevel {
    match stimulus.intent {
        QueryIntent::AskWhy | QueryIntent::AskFeeling => DepthLevel::Deep,
        QueryIntent::AskPattern => DepthLevel::Habit,
        QueryIntent::AskHow | QueryIntent::Compare => DepthLevel::Context,
        _ if mentions_sequence(stimulus) => DepthLevel::Context,
        _ => DepthLevel::Instant,
    }
}

fn mentions_sequence(stimulus: &Stimulus) -> bool {
    let query = stimulus.raw_query.to_lowercase();
    query
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| SEQUENCE_KEYWORDS.contains(&word))
        || stimulus
            .keywords
            .iter()
            .any(|k| SEQUENCE_KEYWORDS.contains(&k.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_depths() {
        let cases = [
            (QueryIntent::AskWhy, DepthLevel::Deep),
            (QueryIntent::AskFeeling, DepthLevel::Deep),
            (QueryIntent::AskPattern, DepthLevel::Habit),
            (QueryIntent::AskHow, DepthLevel::Context),
            (QueryIntent::Compare, DepthLevel::Context),
            (QueryIntent::AskWhat, DepthLevel::Instant),
        ];
        for (intent, expected) in cases {
            let stimulus = Stimulus::new("tell me", intent);
            assert_eq!(detect_depth(&stimulus), expected, "{intent:?}");
        }
    }

    #[test]
    fn test_sequence_words_need_context() {
        let stimulus = Stimulus::new("What happened after the meeting?", QueryIntent::AskWhat);
        assert_eq!(detect_depth(&stimulus), DepthLevel::Context);
    }

    #[test]
    fn test_sequence_word_inside_other_word_ignored() {
        let stimulus = Stimulus::new("Who is the afterparty host?", QueryIntent::AskWho);
        assert_eq!(detect_depth(&stimulus), DepthLevel::Instant);
    }
}

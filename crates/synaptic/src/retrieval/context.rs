//! Memory context formatting

use crate::graph::{Fiber, Neuron, NeuronType};

/// Rough characters-per-token ratio used for budgeting
pub const CHARS_PER_TOKEN: usize = 4;

/// Format matched fibers and activated neurons as a context block.
///
/// Fiber summaries come first, then individual facts tagged with their type.
/// Time neurons are left out. Lines are added until the next one would exceed
/// `max_tokens`.
pub fn format_context(fibers: &[Fiber], neurons: &[Neuron], max_tokens: usize) -> String {
    let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0usize;

    let mut summaries = fibers
        .iter()
        .filter_map(|f| f.summary.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("- {s}"));

    let mut facts = neurons
        .iter()
        .filter(|n| n.neuron_type != NeuronType::Time)
        .map(|n| format!("- [{}] {}", n.neuron_type.label(), n.content));

    let mut push_section = |header: &str, items: &mut dyn Iterator<Item = String>| {
        let mut section = Vec::new();
        for item in items {
            let cost = item.len() + 1 + if section.is_empty() { header.len() + 1 } else { 0 };
            if used + cost > budget {
                break;
            }
            used += cost;
            section.push(item);
        }
        if !section.is_empty() {
            lines.push(header.to_string());
            lines.extend(section);
        }
    };

    push_section("## Memories", &mut summaries);
    push_section("## Facts", &mut facts);

    lines.join("\n")
}

/// Context for a query that matched nothing
pub fn no_match_context(query: &str) -> String {
    format!("No relevant memories found for: {query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_summaries_before_facts() {
        let fact = Neuron::new(NeuronType::Entity, "Alice");
        let fiber = Fiber::new(Vec::new(), Vec::new(), fact.id).with_summary("Alice met Bob");
        let context = format_context(&[fiber], &[fact], 500);

        let summary_at = context.find("Alice met Bob").unwrap();
        let fact_at = context.find("[entity] Alice").unwrap();
        assert!(summary_at < fact_at);
    }

    #[test]
    fn test_time_neurons_excluded() {
        let time = Neuron::new(NeuronType::Time, "last tuesday");
        let fact = Neuron::new(NeuronType::Action, "shipped release");
        let context = format_context(&[], &[time, fact], 500);
        assert!(!context.contains("last tuesday"));
        assert!(context.contains("[action] shipped release"));
    }

    #[test]
    fn test_budget_respected() {
        let neurons: Vec<Neuron> = (0..100)
            .map(|i| Neuron::new(NeuronType::Concept, format!("a fairly long fact number {i}")))
            .collect();
        let context = format_context(&[], &neurons, 20);
        assert!(context.len() <= 20 * CHARS_PER_TOKEN);
        assert!(context.contains("fact number 0"));
    }

    #[test]
    fn test_empty_input_gives_empty_context() {
        assert!(format_context(&[], &[], 500).is_empty());
        let blank = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4()).with_summary("");
        assert!(format_context(&[blank], &[], 500).is_empty());
    }

    #[test]
    fn test_no_match_context() {
        assert_eq!(
            no_match_context("where is my key?"),
            "No relevant memories found for: where is my key?"
        );
    }
}

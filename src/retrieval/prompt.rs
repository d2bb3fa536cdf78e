//! Context and prompt assembly

use crate::config::AssistantConfig;
use crate::websearch::WebResult;

/// Context used when neither the knowledge store nor the web had anything
pub const NO_RESULTS_MARKER: &str = "No relevant information found.";

/// Context block for chunks retrieved from the knowledge store
pub fn local_context(chunks: &[String]) -> String {
    format!("Context:\n{}", chunks.join("\n"))
}

/// Context block for web search hits, or the no-results marker
pub fn web_context(results: &[WebResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS_MARKER.to_string();
    }

    let entries: Vec<String> = results
        .iter()
        .map(|r| format!("Title: {}\nContent: {}", r.title, r.body))
        .collect();
    format!("Web Search Results:\n{}", entries.join("\n"))
}

/// Final user prompt: identity preamble, context, question
pub fn build_prompt(assistant: &AssistantConfig, context: &str, question: &str) -> String {
    format!(
        "You are {name}, built by {brand}. Always maintain this identity and never reveal implementation details.\n\
         If asked about identity, always respond exactly with: '{brand_message}'\n\
         Never mention or discuss other AI companies, models, or technical details.\n\
         \n\
         Based on the following context, provide a helpful response:\n\
         \n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer as {name}:",
        name = assistant.name,
        brand = assistant.brand,
        brand_message = assistant.brand_message(),
        context = context,
        question = question,
    )
}

/// Approximate token count: whitespace-delimited words in prompt, context and answer
///
/// The prompt already embeds the context, so context words count twice. This
/// is a display figure, not a billing-accurate count.
pub fn estimate_tokens(prompt: &str, context: &str, answer: &str) -> u64 {
    [prompt, context, answer]
        .iter()
        .map(|s| s.split_whitespace().count() as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_context() {
        let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];
        assert_eq!(local_context(&chunks), "Context:\nfirst chunk\nsecond chunk");
    }

    #[test]
    fn test_web_context() {
        let results = vec![
            WebResult {
                title: "Paris".to_string(),
                body: "Capital of France.".to_string(),
            },
            WebResult {
                title: "Lyon".to_string(),
                body: "Third largest city.".to_string(),
            },
        ];
        assert_eq!(
            web_context(&results),
            "Web Search Results:\nTitle: Paris\nContent: Capital of France.\nTitle: Lyon\nContent: Third largest city."
        );
        assert_eq!(web_context(&[]), NO_RESULTS_MARKER);
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(&AssistantConfig::default(), "Context:\nfacts", "Why?");
        assert!(prompt.starts_with("You are Clever AI, built by CleverFlow."));
        assert!(prompt.contains("'I am Clever AI built by CleverFlow.'"));
        assert!(prompt.contains("\n\nContext:\nfacts\n\nQuestion: Why?\n\n"));
        assert!(prompt.ends_with("Answer as Clever AI:"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("one two three", "two", "four  five\nsix"), 7);
        assert_eq!(estimate_tokens("", "", ""), 0);
    }
}

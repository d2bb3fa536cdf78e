//! Security gate for questions about the assistant itself
//!
//! Rules are an ordered list of (pattern, canned response) pairs evaluated
//! top-down; the first match wins. The built-in list below is the public
//! default order. A rule file replaces it entirely:
//!
//! ```toml
//! [[rule]]
//! name = "identity"
//! pattern = '\b(who|what)\b.*\bmade\b.*\byou\b'
//! response = "{brand_message}"
//! ```
//!
//! Responses may use the `{name}`, `{brand}` and `{brand_message}` placeholders.

use crate::config::{AssistantConfig, Config};
use crate::error::{DocQaError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rule definition as written in a rule file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub pattern: String,
    pub response: String,
}

/// Rule file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesFile {
    pub rule: Vec<RuleConfig>,
}

/// Compiled security rule
#[derive(Debug, Clone)]
pub struct SecurityRule {
    pub name: String,
    pub regex: Regex,
    pub response: String,
}

/// Built-in rules in evaluation order: (name, pattern, response template)
const DEFAULT_RULES: &[(&str, &str, &str)] = &[
    (
        "identity-creator",
        r"\b(who|what)\b.*\b(made|created|developed|built|designed)\b.*\byou\b",
        "{brand_message}",
    ),
    (
        "identity-name",
        r"\b(who|what)\b.*\b(are you|is your name|company|built you)\b",
        "{brand_message}",
    ),
    (
        "identity-background",
        r"\b(tell me about|describe)\b.*\b(yourself|your background)\b",
        "{brand_message}",
    ),
    (
        "model-disclosure",
        r"\b(what|which)\b.*\b(models?|language models?|llms?|ai models?|foundation)\b.*\b(using|based)\b",
        "I cannot disclose information about my technical implementation.",
    ),
    (
        "integration",
        r"\b(how|what)\b.*\b(connect|communicate|integrated|implemented|api|endpoint)\b",
        "I focus on helping you with your questions rather than discussing technical details.",
    ),
    (
        "architecture",
        r"\b(what is|what's|explain)\b.*\b(your architecture|your implementation|your code|your system)\b",
        "I keep my implementation details confidential to focus on helping you better.",
    ),
    (
        "other-platforms",
        r"\b(openai|anthropic|deepseek|chatgpt|gpt|claude|gemini|llama|mistral)",
        "I am {name} and I don't discuss other AI platforms.",
    ),
    (
        "technical-probing",
        r"\b(reverse engineer|decompile|system architecture|technical details|backend)\b",
        "That information is protected. How can I help you with your documents?",
    ),
    (
        "operations",
        r"\b(how do you|how does this)\b.*\b(work|function|operate|process|analyze)",
        "Let's focus on how I can help you rather than discussing my operations.",
    ),
    (
        "credentials",
        r"\b(api keys?|api endpoints?|base urls?|tokens?|credentials?)\b",
        "I cannot discuss API or integration details. Please contact {brand} for such inquiries.",
    ),
    (
        "training",
        r"\b(training|trained|fine-tuned|models?|datasets?)\b",
        "I keep my training details confidential. Let's focus on how I can help you.",
    ),
    (
        "data-handling",
        r"\b(how do you|where do you)\b.*\b(store|save|process|handle|manage)\b.*\b(data|information|documents)\b",
        "Your data privacy and security are important to me, but I cannot disclose system details.",
    ),
];

/// Ordered, first-match-wins question filter
#[derive(Debug, Clone)]
pub struct SecurityGate {
    rules: Vec<SecurityRule>,
}

impl SecurityGate {
    pub fn new(rules: Vec<SecurityRule>) -> Self {
        Self { rules }
    }

    /// Gate with the built-in rule list
    pub fn with_default_rules(assistant: &AssistantConfig) -> Result<Self> {
        let configs = DEFAULT_RULES
            .iter()
            .map(|(name, pattern, response)| RuleConfig {
                name: name.to_string(),
                pattern: pattern.to_string(),
                response: response.to_string(),
            })
            .collect::<Vec<_>>();
        Self::from_rule_configs(&configs, assistant)
    }

    /// Gate with the rules of a TOML rule file, in file order
    pub fn from_file(path: &Path, assistant: &AssistantConfig) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to read security rules: {:?}", path),
        })?;
        let file: RulesFile = toml::from_str(&content)?;
        Self::from_rule_configs(&file.rule, assistant)
    }

    /// Rule file from the configuration if set, built-in rules otherwise
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.security.rules_file {
            Some(path) => Self::from_file(path, &config.assistant),
            None => Self::with_default_rules(&config.assistant),
        }
    }

    pub fn from_rule_configs(rules: &[RuleConfig], assistant: &AssistantConfig) -> Result<Self> {
        let brand_message = assistant.brand_message();
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        DocQaError::Config(format!(
                            "Invalid pattern for security rule '{}': {}",
                            rule.name, e
                        ))
                    })?;
                let response = rule
                    .response
                    .replace("{brand_message}", &brand_message)
                    .replace("{name}", &assistant.name)
                    .replace("{brand}", &assistant.brand);
                Ok(SecurityRule {
                    name: rule.name.clone(),
                    regex,
                    response,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(rules))
    }

    /// First rule matching `question`, if any
    pub fn matching_rule(&self, question: &str) -> Option<&SecurityRule> {
        self.rules.iter().find(|rule| rule.regex.is_match(question))
    }

    /// `(true, response)` for a blocked question, `(false, "")` otherwise
    pub fn check(&self, question: &str) -> (bool, String) {
        match self.matching_rule(question) {
            Some(rule) => {
                tracing::debug!(rule = %rule.name, "Question blocked by security gate");
                (true, rule.response.clone())
            }
            None => (false, String::new()),
        }
    }

    pub fn rules(&self) -> &[SecurityRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gate() -> SecurityGate {
        SecurityGate::with_default_rules(&AssistantConfig::default()).unwrap()
    }

    #[test]
    fn test_default_rules_compile_in_order() {
        let gate = gate();
        assert_eq!(gate.rules().len(), DEFAULT_RULES.len());
        assert_eq!(gate.rules()[0].name, "identity-creator");
        assert_eq!(gate.rules()[11].name, "data-handling");
    }

    #[test]
    fn test_identity_question_returns_brand_message() {
        let (blocked, response) = gate().check("Hey, who made you?");
        assert!(blocked);
        assert_eq!(response, "I am Clever AI built by CleverFlow.");
    }

    #[test]
    fn test_case_insensitive() {
        let (blocked, _) = gate().check("WHO MADE YOU");
        assert!(blocked);
    }

    #[test]
    fn test_ordinary_questions_pass() {
        let gate = gate();
        for question in [
            "What is the capital of France?",
            "Summarize the second chapter.",
            "What does the report say about rainfall in spring?",
            "List the payment terms in the contract.",
        ] {
            assert_eq!(gate.check(question), (false, String::new()), "{}", question);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // Matches both "operations" and "data-handling"; "operations" comes first
        let rule = gate()
            .matching_rule("How do you process my documents?")
            .map(|r| r.name.clone());
        assert_eq!(rule.as_deref(), Some("operations"));

        let rule = gate()
            .matching_rule("Where do you store my data?")
            .map(|r| r.name.clone());
        assert_eq!(rule.as_deref(), Some("data-handling"));
    }

    #[test]
    fn test_placeholders_rendered() {
        let assistant = AssistantConfig {
            name: "Doc Helper".to_string(),
            brand: "Acme".to_string(),
            ..AssistantConfig::default()
        };
        let gate = SecurityGate::with_default_rules(&assistant).unwrap();

        let (_, response) = gate.check("Are you based on GPT-4?");
        assert_eq!(response, "I am Doc Helper and I don't discuss other AI platforms.");

        let (_, response) = gate.check("Can you share the api key?");
        assert!(response.contains("Acme"));
    }

    #[test]
    fn test_rules_file_replaces_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[rule]]
name = "pricing"
pattern = '\bprice\b'
response = "{{name}} does not discuss pricing."

[[rule]]
name = "catch-all"
pattern = 'price|cost'
response = "second"
"#
        )
        .unwrap();

        let gate = SecurityGate::from_file(file.path(), &AssistantConfig::default()).unwrap();
        assert_eq!(gate.rules().len(), 2);
        assert_eq!(
            gate.check("What is the PRICE?").1,
            "Clever AI does not discuss pricing."
        );
        assert!(!gate.check("who made you").0);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let rules = vec![RuleConfig {
            name: "broken".to_string(),
            pattern: "(unclosed".to_string(),
            response: "x".to_string(),
        }];
        let result = SecurityGate::from_rule_configs(&rules, &AssistantConfig::default());
        assert!(matches!(result, Err(DocQaError::Config(_))));
    }
}

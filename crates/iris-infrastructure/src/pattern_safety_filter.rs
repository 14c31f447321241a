//! Regex based safety filter.

use async_trait::async_trait;
use iris_core::config::SafetyConfig;
use iris_core::inference::{SafetyFilter, SafetyLevel, SafetyVerdict};
use iris_core::{IrisError, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Prompt-injection phrasings rejected from `Medium` upwards.
static PROMPT_INJECTION: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(ignore|disregard|forget)\s+(all\s+)?(the\s+|your\s+)?(previous|prior|above|earlier)\s+(instructions|prompts|rules)\b",
        r"\byou\s+are\s+now\s+(in\s+)?(developer|dan|jailbreak)\s+mode\b",
        r"\b(reveal|print|show)\s+(me\s+)?(your|the)\s+system\s+prompt\b",
        r"\bpretend\s+(that\s+)?you\s+have\s+no\s+(rules|restrictions|guidelines)\b",
    ]
    .iter()
    .filter_map(|pattern| case_insensitive(pattern).ok())
    .collect()
});

fn case_insensitive(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Rejects text matching built-in prompt-injection patterns and configured
/// blocked patterns.
///
/// | level  | input                      | output                     |
/// |--------|----------------------------|----------------------------|
/// | off    | allowed                    | allowed                    |
/// | low    | blocked patterns           | blocked patterns           |
/// | medium | blocked + prompt injection | blocked patterns           |
/// | high   | blocked + prompt injection | blocked + prompt injection |
pub struct PatternSafetyFilter {
    level: SafetyLevel,
    blocked: Vec<Regex>,
}

impl PatternSafetyFilter {
    pub fn new(level: SafetyLevel, blocked_patterns: &[String]) -> Result<Self> {
        let blocked = blocked_patterns
            .iter()
            .map(|pattern| {
                case_insensitive(pattern).map_err(|e| {
                    IrisError::config(format!("invalid blocked pattern '{}': {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { level, blocked })
    }

    pub fn from_config(config: &SafetyConfig) -> Result<Self> {
        Self::new(config.level, &config.blocked_patterns)
    }

    fn check(&self, text: &str, injection: bool) -> SafetyVerdict {
        if self.level == SafetyLevel::Off {
            return SafetyVerdict::allow();
        }
        if injection && PROMPT_INJECTION.iter().any(|re| re.is_match(text)) {
            return SafetyVerdict::reject("prompt injection attempt detected");
        }
        if let Some(re) = self.blocked.iter().find(|re| re.is_match(text)) {
            return SafetyVerdict::reject(format!("matched blocked pattern '{}'", re.as_str()));
        }
        SafetyVerdict::allow()
    }
}

#[async_trait]
impl SafetyFilter for PatternSafetyFilter {
    async fn check_input(&self, text: &str) -> SafetyVerdict {
        let verdict = self.check(text, self.level >= SafetyLevel::Medium);
        if !verdict.allowed {
            tracing::debug!(target: "safety", level = %self.level, "Rejected input");
        }
        verdict
    }

    async fn check_output(&self, text: &str) -> SafetyVerdict {
        self.check(text, self.level >= SafetyLevel::High)
    }
}

//! Safety filter collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;

/// How aggressively the safety filter rejects content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Off,
    Low,
    #[default]
    Medium,
    High,
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait SafetyFilter: Send + Sync {
    async fn check_input(&self, text: &str) -> SafetyVerdict;

    async fn check_output(&self, text: &str) -> SafetyVerdict;
}

/// Filter that allows everything.
pub struct PermissiveSafetyFilter;

#[async_trait]
impl SafetyFilter for PermissiveSafetyFilter {
    async fn check_input(&self, _text: &str) -> SafetyVerdict {
        SafetyVerdict::allow()
    }

    async fn check_output(&self, _text: &str) -> SafetyVerdict {
        SafetyVerdict::allow()
    }
}

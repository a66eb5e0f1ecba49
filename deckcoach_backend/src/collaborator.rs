use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a generation collaborator's output was discarded in favour of local behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FallbackCause {
    /// Endpoint or key missing.
    Unconfigured,
    /// Network failure or non-2xx status.
    Request(String),
    /// Response arrived but did not have the expected shape.
    Malformed(String),
}

impl FallbackCause {
    pub fn request(err: &anyhow::Error) -> Self {
        FallbackCause::Request(format!("{:#}", err))
    }

    pub fn malformed(err: &anyhow::Error) -> Self {
        FallbackCause::Malformed(format!("{:#}", err))
    }
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackCause::Unconfigured => write!(f, "generation service not configured"),
            FallbackCause::Request(detail) => write!(f, "generation request failed: {}", detail),
            FallbackCause::Malformed(detail) => {
                write!(f, "generation response malformed: {}", detail)
            }
        }
    }
}

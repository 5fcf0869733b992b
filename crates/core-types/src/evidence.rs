//! Evidence artifacts carried as proof of step outcomes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Screenshot,
    Text,
    ExecutionLog,
    ExtractedData,
}

/// Immutable typed artifact. Construct through [`Evidence::new`] so the payload and
/// confidence invariants always hold; deserialization runs the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvidence")]
pub struct Evidence {
    kind: EvidenceKind,
    data: Value,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Percentage in [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    created_at: DateTime<Utc>,
}

/// Wire form of [`Evidence`], validated on the way in.
#[derive(Deserialize)]
struct RawEvidence {
    kind: EvidenceKind,
    data: Value,
    source: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl TryFrom<RawEvidence> for Evidence {
    type Error = CoreError;

    fn try_from(raw: RawEvidence) -> Result<Self, Self::Error> {
        let mut evidence = Evidence::new(raw.kind, raw.data, raw.source)?;
        if let Some(description) = raw.description {
            evidence = evidence.with_description(description);
        }
        if let Some(confidence) = raw.confidence {
            evidence = evidence.with_confidence(confidence)?;
        }
        evidence.created_at = raw.created_at;
        Ok(evidence)
    }
}

impl Evidence {
    pub fn new(
        kind: EvidenceKind,
        data: impl Into<Value>,
        source: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let data = data.into();
        if is_empty_payload(&data) {
            return Err(CoreError::EmptyEvidence);
        }
        Ok(Self {
            kind,
            data,
            source: source.into(),
            description: None,
            confidence: None,
            created_at: Utc::now(),
        })
    }

    /// Shorthand for a text artifact.
    pub fn text(text: impl Into<String>, source: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(EvidenceKind::Text, Value::String(text.into()), source)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Result<Self, CoreError> {
        if !(0.0..=100.0).contains(&confidence) {
            return Err(CoreError::ConfidenceOutOfRange(confidence));
        }
        self.confidence = Some(confidence);
        Ok(self)
    }

    pub fn kind(&self) -> EvidenceKind {
        self.kind
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the artifact is younger than `max_age`.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => Utc::now().signed_duration_since(self.created_at) <= max_age,
            Err(_) => true,
        }
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

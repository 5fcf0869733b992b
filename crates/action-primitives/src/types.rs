//! Core data types for micro-actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core_types::{ActionId, ClassifiedError};

/// Scroll direction for scroll actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Default scroll distance in pixels when an action omits `amount`.
pub const DEFAULT_SCROLL_AMOUNT: i32 = 500;

/// The closed set of micro-action types.
///
/// Element-targeted variants keep `element` optional so that a decomposer output
/// missing the index still parses and is reported as a failed action instead of a
/// deserialization error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Click {
        #[serde(default)]
        element: Option<u32>,
    },
    Fill {
        #[serde(default)]
        element: Option<u32>,
        value: String,
    },
    Clear {
        #[serde(default)]
        element: Option<u32>,
    },
    Hover {
        #[serde(default)]
        element: Option<u32>,
    },
    Select {
        #[serde(default)]
        element: Option<u32>,
        option: String,
    },
    Drag {
        #[serde(default)]
        element: Option<u32>,
        #[serde(default)]
        target: Option<u32>,
    },
    Scroll {
        direction: ScrollDirection,
        #[serde(default)]
        amount: Option<i32>,
    },
    Wait {
        ms: u64,
    },
    WaitForElement {
        query: String,
    },
    Extract {
        #[serde(default)]
        element: Option<u32>,
        key: String,
    },
    ExtractUrl {
        key: String,
    },
    ExtractHref {
        #[serde(default)]
        element: Option<u32>,
        key: String,
    },
    Navigate {
        url: String,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click { .. } => "click",
            ActionKind::Fill { .. } => "fill",
            ActionKind::Clear { .. } => "clear",
            ActionKind::Hover { .. } => "hover",
            ActionKind::Select { .. } => "select",
            ActionKind::Drag { .. } => "drag",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Wait { .. } => "wait",
            ActionKind::WaitForElement { .. } => "wait_for_element",
            ActionKind::Extract { .. } => "extract",
            ActionKind::ExtractUrl { .. } => "extract_url",
            ActionKind::ExtractHref { .. } => "extract_href",
            ActionKind::Navigate { .. } => "navigate",
        }
    }

    /// Extraction actions read the surface and never change it.
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            ActionKind::Extract { .. } | ActionKind::ExtractUrl { .. } | ActionKind::ExtractHref { .. }
        )
    }

    /// Everything except extraction is treated as state-mutating, waits included.
    pub fn is_mutating(&self) -> bool {
        !self.is_extraction()
    }

    /// Key under which an extraction stores its value.
    pub fn extraction_key(&self) -> Option<&str> {
        match self {
            ActionKind::Extract { key, .. }
            | ActionKind::ExtractUrl { key }
            | ActionKind::ExtractHref { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }

    /// Element index for element-targeted actions.
    pub fn element(&self) -> Option<u32> {
        match self {
            ActionKind::Click { element }
            | ActionKind::Fill { element, .. }
            | ActionKind::Clear { element }
            | ActionKind::Hover { element }
            | ActionKind::Select { element, .. }
            | ActionKind::Drag { element, .. }
            | ActionKind::Extract { element, .. }
            | ActionKind::ExtractHref { element, .. } => *element,
            ActionKind::Scroll { .. }
            | ActionKind::Wait { .. }
            | ActionKind::WaitForElement { .. }
            | ActionKind::ExtractUrl { .. }
            | ActionKind::Navigate { .. } => None,
        }
    }
}

/// Per-action timing overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTiming {
    /// Upper bound for the action itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Settle delay applied after this action when another one follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_ms: Option<u64>,
}

/// One atomic operation produced by a decomposer for a single step attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroAction {
    pub action: ActionKind,
    #[serde(default)]
    pub timing: ActionTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MicroAction {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            timing: ActionTiming::default(),
            description: None,
        }
    }

    pub fn click(element: u32) -> Self {
        Self::new(ActionKind::Click {
            element: Some(element),
        })
    }

    pub fn fill(element: u32, value: impl Into<String>) -> Self {
        Self::new(ActionKind::Fill {
            element: Some(element),
            value: value.into(),
        })
    }

    pub fn extract(element: u32, key: impl Into<String>) -> Self {
        Self::new(ActionKind::Extract {
            element: Some(element),
            key: key.into(),
        })
    }

    pub fn extract_url(key: impl Into<String>) -> Self {
        Self::new(ActionKind::ExtractUrl { key: key.into() })
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(ActionKind::Navigate { url: url.into() })
    }

    pub fn wait(ms: u64) -> Self {
        Self::new(ActionKind::Wait { ms })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timing.timeout_ms = Some(timeout_ms);
        self
    }

    /// Short form used in logs and failed-approach descriptions, e.g. `click#3`.
    pub fn summary(&self) -> String {
        match self.action.element() {
            Some(index) => format!("{}#{}", self.action.name(), index),
            None => match &self.action {
                ActionKind::Navigate { url } => format!("navigate({url})"),
                ActionKind::WaitForElement { query } => format!("wait_for_element({query})"),
                other => other.name().to_string(),
            },
        }
    }
}

/// Outcome of reading a value from the surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Extraction {
    /// The action is not an extraction.
    NotApplicable,
    /// Checked, nothing found.
    Empty,
    Found(String),
}

impl Extraction {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(text) if !text.trim().is_empty() => Extraction::Found(text.trim().to_string()),
            _ => Extraction::Empty,
        }
    }

    /// `None` for "checked and empty" as well as "not applicable"; use
    /// [`Extraction::was_checked`] to tell them apart.
    pub fn value(&self) -> Option<&str> {
        match self {
            Extraction::Found(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn was_checked(&self) -> bool {
        !matches!(self, Extraction::NotApplicable)
    }
}

/// Result of one micro-action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: ActionId,
    pub action_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
    pub duration_ms: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_key: Option<String>,
    pub extraction: Extraction,
}

impl ActionResult {
    pub fn success(action: &MicroAction, duration_ms: u64, extraction: Extraction) -> Self {
        Self {
            action_id: ActionId::new(),
            action_type: action.action.name().to_string(),
            success: true,
            error: None,
            duration_ms,
            timestamp: Utc::now(),
            extraction_key: action.action.extraction_key().map(str::to_string),
            extraction,
        }
    }

    pub fn failure(action: &MicroAction, duration_ms: u64, error: ClassifiedError) -> Self {
        Self {
            action_id: ActionId::new(),
            action_type: action.action.name().to_string(),
            success: false,
            error: Some(error),
            duration_ms,
            timestamp: Utc::now(),
            extraction_key: action.action.extraction_key().map(str::to_string),
            extraction: if action.action.is_extraction() {
                Extraction::Empty
            } else {
                Extraction::NotApplicable
            },
        }
    }

    pub fn extracted_value(&self) -> Option<&str> {
        self.extraction.value()
    }
}

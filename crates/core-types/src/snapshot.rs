//! Indexed view of the interactive surface at one point in time.
//!
//! Element indexing happens outside the engine; the snapshot is what the indexer hands
//! over. Micro-actions refer to elements by `index`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// One indexed interactive element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub index: u32,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl ElementInfo {
    pub fn new(index: u32, tag: impl Into<String>) -> Self {
        Self {
            index,
            tag: tag.into(),
            role: None,
            text: None,
            attributes: BTreeMap::new(),
            bounds: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Visible label used for matching: text, then aria-label, placeholder, name.
    pub fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or_else(|| self.attribute("aria-label"))
            .or_else(|| self.attribute("placeholder"))
            .or_else(|| self.attribute("name"))
    }

    /// Whether the element's label contains `needle`, ignoring ASCII case.
    pub fn matches_label(&self, needle: &str) -> bool {
        let needle = needle.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.label()
            .map(|label| label.to_ascii_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}

/// Snapshot handed to decomposers and evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementInfo>,
    pub captured_at: DateTime<Utc>,
}

impl SurfaceSnapshot {
    pub fn new(url: impl Into<String>, title: Option<String>, elements: Vec<ElementInfo>) -> Self {
        Self {
            url: url.into(),
            title,
            elements,
            captured_at: Utc::now(),
        }
    }

    pub fn blank() -> Self {
        Self::new("about:blank", None, Vec::new())
    }

    pub fn element(&self, index: u32) -> Option<&ElementInfo> {
        self.elements.iter().find(|element| element.index == index)
    }

    /// First element whose label contains `needle`.
    pub fn find_by_label(&self, needle: &str) -> Option<&ElementInfo> {
        self.elements
            .iter()
            .find(|element| element.matches_label(needle))
    }

    /// Whether the title, URL or any element label mentions `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        let lower = needle.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return false;
        }
        self.url.to_ascii_lowercase().contains(&lower)
            || self
                .title
                .as_deref()
                .map(|title| title.to_ascii_lowercase().contains(&lower))
                .unwrap_or(false)
            || self.elements.iter().any(|element| element.matches_label(&lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SurfaceSnapshot {
        SurfaceSnapshot::new(
            "https://shop.test/results",
            Some("Results".to_string()),
            vec![
                ElementInfo::new(0, "input").with_attribute("placeholder", "Search products"),
                ElementInfo::new(1, "button").with_text("4+ stars"),
            ],
        )
    }

    #[test]
    fn label_falls_back_to_attributes() {
        let snapshot = sample();
        assert_eq!(snapshot.element(0).unwrap().label(), Some("Search products"));
        assert_eq!(snapshot.find_by_label("SEARCH").unwrap().index, 0);
        assert!(snapshot.element(9).is_none());
    }

    #[test]
    fn mentions_checks_title_url_and_labels() {
        let snapshot = sample();
        assert!(snapshot.mentions("results"));
        assert!(snapshot.mentions("4+ stars"));
        assert!(!snapshot.mentions("checkout"));
        assert!(!snapshot.mentions(""));
    }

    #[test]
    fn bounds_center() {
        let bounds = Bounds {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
        };
        assert_eq!(bounds.center(), Point { x: 60.0, y: 40.0 });
    }
}

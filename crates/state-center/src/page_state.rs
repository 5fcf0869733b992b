//! Semantic page-state classification
//!
//! A coarse, deterministic reading of the element set: which sections a page has and
//! which kinds of action it offers. Only element structure feeds the classification,
//! so two snapshots with the same elements classify identically.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core_types::{ElementInfo, SurfaceSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSection {
    Navigation,
    SearchBox,
    Form,
    Filters,
    ResultList,
    Pagination,
    Content,
    Dialog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailableAction {
    Click,
    Fill,
    Search,
    Select,
    Filter,
    Paginate,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Empty,
    SearchResults,
    Listing,
    Form,
    Article,
    Landing,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageKind::Empty => "empty",
            PageKind::SearchResults => "search_results",
            PageKind::Listing => "listing",
            PageKind::Form => "form",
            PageKind::Article => "article",
            PageKind::Landing => "landing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticPageState {
    pub url: String,
    pub title: Option<String>,
    pub kind: PageKind,
    pub sections: BTreeSet<PageSection>,
    pub actions: BTreeSet<AvailableAction>,
    pub element_count: usize,
    pub captured_at: DateTime<Utc>,
}

impl SemanticPageState {
    /// Structural signature, e.g. `search_results|search_box,result_list|click,search`.
    pub fn signature(&self) -> String {
        let sections: Vec<String> = self
            .sections
            .iter()
            .map(|section| snake(section))
            .collect();
        let actions: Vec<String> = self.actions.iter().map(|action| snake(action)).collect();
        format!("{}|{}|{}", self.kind, sections.join(","), actions.join(","))
    }

    pub fn same_structure(&self, other: &SemanticPageState) -> bool {
        self.kind == other.kind && self.sections == other.sections && self.actions == other.actions
    }
}

fn snake<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn lower(value: Option<&str>) -> String {
    value.unwrap_or_default().to_ascii_lowercase()
}

fn is_input(element: &ElementInfo) -> bool {
    matches!(element.tag.as_str(), "input" | "textarea") || element.role.as_deref() == Some("textbox")
}

fn is_search(element: &ElementInfo) -> bool {
    if element.role.as_deref() == Some("searchbox") {
        return true;
    }
    if !is_input(element) {
        return false;
    }
    ["type", "name", "placeholder", "aria-label"]
        .iter()
        .any(|attr| lower(element.attribute(attr)).contains("search"))
}

fn is_link(element: &ElementInfo) -> bool {
    element.tag == "a" || element.role.as_deref() == Some("link")
}

fn is_button(element: &ElementInfo) -> bool {
    element.tag == "button" || element.role.as_deref() == Some("button")
}

fn is_list_item(element: &ElementInfo) -> bool {
    matches!(element.tag.as_str(), "li" | "article" | "tr")
        || matches!(element.role.as_deref(), Some("listitem" | "article" | "row"))
}

fn is_filter(element: &ElementInfo) -> bool {
    let label = lower(element.label());
    element.attribute("type") == Some("checkbox")
        || element.role.as_deref() == Some("checkbox")
        || label.contains("filter")
        || label.contains("sort by")
}

fn is_pager(element: &ElementInfo) -> bool {
    let label = lower(element.label());
    let label = label.trim();
    (is_link(element) || is_button(element))
        && (label == "next" || label == "previous" || label == "prev" || label.starts_with("next ") || label == "›" || label == "»")
}

fn is_submit(element: &ElementInfo) -> bool {
    let label = lower(element.label());
    element.attribute("type") == Some("submit")
        || (is_button(element) && ["submit", "search", "go", "apply"].contains(&label.trim()))
}

/// Classify the element set of `snapshot`.
pub fn classify(snapshot: &SurfaceSnapshot) -> SemanticPageState {
    let elements = &snapshot.elements;
    let mut sections = BTreeSet::new();
    let mut actions = BTreeSet::new();

    let links = elements.iter().filter(|e| is_link(e)).count();
    let list_items = elements.iter().filter(|e| is_list_item(e)).count();

    if elements.iter().any(|e| e.tag == "nav" || e.role.as_deref() == Some("navigation")) || links >= 5 {
        sections.insert(PageSection::Navigation);
    }
    if elements.iter().any(is_search) {
        sections.insert(PageSection::SearchBox);
        actions.insert(AvailableAction::Search);
    }
    if elements.iter().any(|e| is_input(e) || e.tag == "form" || e.tag == "select") {
        sections.insert(PageSection::Form);
    }
    if elements.iter().any(is_filter) {
        sections.insert(PageSection::Filters);
        actions.insert(AvailableAction::Filter);
    }
    if list_items >= 3 {
        sections.insert(PageSection::ResultList);
    }
    if elements.iter().any(is_pager) {
        sections.insert(PageSection::Pagination);
        actions.insert(AvailableAction::Paginate);
    }
    if elements
        .iter()
        .any(|e| matches!(e.tag.as_str(), "p" | "h1" | "h2" | "h3" | "main"))
    {
        sections.insert(PageSection::Content);
    }
    if elements
        .iter()
        .any(|e| e.tag == "dialog" || matches!(e.role.as_deref(), Some("dialog" | "alertdialog")))
    {
        sections.insert(PageSection::Dialog);
    }

    if links > 0 || elements.iter().any(is_button) {
        actions.insert(AvailableAction::Click);
    }
    if elements.iter().any(is_input) {
        actions.insert(AvailableAction::Fill);
    }
    if elements.iter().any(|e| e.tag == "select" || e.role.as_deref() == Some("combobox")) {
        actions.insert(AvailableAction::Select);
    }
    if elements.iter().any(is_submit) {
        actions.insert(AvailableAction::Submit);
    }

    let kind = if elements.is_empty() {
        PageKind::Empty
    } else if sections.contains(&PageSection::ResultList) && sections.contains(&PageSection::SearchBox) {
        PageKind::SearchResults
    } else if sections.contains(&PageSection::ResultList) {
        PageKind::Listing
    } else if sections.contains(&PageSection::Form) && !sections.contains(&PageSection::Content) {
        PageKind::Form
    } else if sections.contains(&PageSection::Content) {
        PageKind::Article
    } else {
        PageKind::Landing
    };

    SemanticPageState {
        url: snapshot.url.clone(),
        title: snapshot.title.clone(),
        kind,
        sections,
        actions,
        element_count: elements.len(),
        captured_at: snapshot.captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results_page(url: &str) -> SurfaceSnapshot {
        SurfaceSnapshot::new(
            url,
            Some("Results".into()),
            vec![
                ElementInfo::new(0, "input").with_attribute("placeholder", "Search products"),
                ElementInfo::new(1, "button").with_text("Search"),
                ElementInfo::new(2, "li").with_text("Laptop A"),
                ElementInfo::new(3, "li").with_text("Laptop B"),
                ElementInfo::new(4, "li").with_text("Laptop C"),
                ElementInfo::new(5, "input").with_attribute("type", "checkbox").with_text("4+ stars"),
                ElementInfo::new(6, "a").with_text("Next"),
            ],
        )
    }

    #[test]
    fn classifies_search_results() {
        let state = classify(&results_page("https://shop.test/s?q=laptop"));
        assert_eq!(state.kind, PageKind::SearchResults);
        assert!(state.sections.contains(&PageSection::SearchBox));
        assert!(state.sections.contains(&PageSection::ResultList));
        assert!(state.sections.contains(&PageSection::Filters));
        assert!(state.sections.contains(&PageSection::Pagination));
        assert!(state.actions.contains(&AvailableAction::Submit));
        assert_eq!(state.element_count, 7);
    }

    #[test]
    fn identical_structure_classifies_identically() {
        let first = classify(&results_page("https://shop.test/s?q=laptop"));
        let second = classify(&results_page("https://shop.test/s?q=phone"));
        assert!(first.same_structure(&second));
        assert_eq!(first.signature(), second.signature());
    }

    #[test]
    fn empty_snapshot_is_empty_kind() {
        let state = classify(&SurfaceSnapshot::blank());
        assert_eq!(state.kind, PageKind::Empty);
        assert!(state.sections.is_empty());
        assert!(state.actions.is_empty());
        assert_eq!(state.signature(), "empty||");
    }

    #[test]
    fn article_with_links() {
        let snapshot = SurfaceSnapshot::new(
            "https://news.test/a/1",
            None,
            vec![
                ElementInfo::new(0, "h1").with_text("Headline"),
                ElementInfo::new(1, "p").with_text("Body"),
                ElementInfo::new(2, "a").with_text("Home"),
            ],
        );
        let state = classify(&snapshot);
        assert_eq!(state.kind, PageKind::Article);
        assert_eq!(state.actions, BTreeSet::from([AvailableAction::Click]));
    }
}

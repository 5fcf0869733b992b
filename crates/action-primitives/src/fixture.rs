//! Scripted in-memory surface
//!
//! A small page graph used by tests and offline scenario runs. Elements are indexed
//! in declaration order and laid out in a single column so every index has stable
//! geometry.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stepwise_core_types::{Bounds, ElementInfo, Point, SurfaceSnapshot};
use tracing::debug;

use crate::surface::{DriverError, SnapshotProvider, SurfaceDriver};

const ROW_HEIGHT: f64 = 40.0;
const ELEMENT_WIDTH: f64 = 200.0;
const ELEMENT_HEIGHT: f64 = 30.0;

/// Pages reachable from a start url.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFixture {
    pub start: String,
    #[serde(default)]
    pub pages: Vec<FixturePage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixturePage {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub elements: Vec<FixtureElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureElement {
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Clicking navigates here; also exposed as the `href` attribute.
    #[serde(default)]
    pub href: Option<String>,
    /// Allowed values for select; empty accepts anything.
    #[serde(default)]
    pub options: Vec<String>,
}

impl FixtureElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

impl FixturePage {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: Some(title.into()),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: FixtureElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    page: usize,
    values: BTreeMap<(usize, u32), String>,
    scroll: (i32, i32),
    log: Vec<String>,
}

/// Deterministic [`SurfaceDriver`] + [`SnapshotProvider`] over a [`SurfaceFixture`].
#[derive(Debug)]
pub struct ScriptedSurface {
    fixture: SurfaceFixture,
    state: Mutex<SurfaceState>,
}

fn bounds_for(index: u32) -> Bounds {
    Bounds {
        x: 0.0,
        y: f64::from(index) * ROW_HEIGHT,
        width: ELEMENT_WIDTH,
        height: ELEMENT_HEIGHT,
    }
}

fn index_at(point: Point) -> Option<u32> {
    if point.x < 0.0 || point.x > ELEMENT_WIDTH || point.y < 0.0 {
        return None;
    }
    let row = (point.y / ROW_HEIGHT).floor();
    if point.y - row * ROW_HEIGHT > ELEMENT_HEIGHT {
        return None;
    }
    Some(row as u32)
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

impl ScriptedSurface {
    pub fn new(fixture: SurfaceFixture) -> Result<Self, DriverError> {
        let page = fixture
            .pages
            .iter()
            .position(|page| same_url(&page.url, &fixture.start))
            .ok_or_else(|| {
                DriverError::Navigation(format!("start page {} is not scripted", fixture.start))
            })?;
        Ok(Self {
            fixture,
            state: Mutex::new(SurfaceState {
                page,
                ..SurfaceState::default()
            }),
        })
    }

    /// Driver calls observed so far, e.g. `click#2` or `navigate https://...`.
    pub fn action_log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn current_page_url(&self) -> String {
        let page = self.state.lock().page;
        self.fixture.pages[page].url.clone()
    }

    fn record(&self, entry: String) {
        self.state.lock().log.push(entry);
    }

    fn go_to(&self, url: &str) -> Result<(), DriverError> {
        let target = self
            .fixture
            .pages
            .iter()
            .position(|page| same_url(&page.url, url))
            .ok_or_else(|| DriverError::Navigation(format!("no page scripted for {url}")))?;
        let mut state = self.state.lock();
        state.page = target;
        state.scroll = (0, 0);
        debug!(url, "scripted surface navigated");
        Ok(())
    }

    /// Element on the current page under `point`, with the page index.
    fn element_at(&self, point: Point) -> Result<(usize, u32, &FixtureElement), DriverError> {
        let page = self.state.lock().page;
        let index = index_at(point).ok_or_else(|| {
            DriverError::TargetNotFound(format!("nothing at ({}, {})", point.x, point.y))
        })?;
        let element = self.fixture.pages[page]
            .elements
            .get(index as usize)
            .ok_or_else(|| DriverError::TargetNotFound(format!("no element at index {index}")))?;
        Ok((page, index, element))
    }
}

#[async_trait]
impl SurfaceDriver for ScriptedSurface {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(format!("navigate {url}"));
        self.go_to(url)
    }

    async fn click_at(&self, point: Point) -> Result<(), DriverError> {
        let (_, index, element) = self.element_at(point)?;
        self.record(format!("click#{index}"));
        if let Some(href) = element.href.clone() {
            self.go_to(&href)?;
        }
        Ok(())
    }

    async fn fill_at(&self, point: Point, text: &str) -> Result<(), DriverError> {
        let (page, index, _) = self.element_at(point)?;
        let mut state = self.state.lock();
        state.values.insert((page, index), text.to_string());
        state.log.push(format!("fill#{index}"));
        Ok(())
    }

    async fn clear_at(&self, point: Point) -> Result<(), DriverError> {
        let (page, index, _) = self.element_at(point)?;
        let mut state = self.state.lock();
        state.values.remove(&(page, index));
        state.log.push(format!("clear#{index}"));
        Ok(())
    }

    async fn hover_at(&self, point: Point) -> Result<(), DriverError> {
        let (_, index, _) = self.element_at(point)?;
        self.record(format!("hover#{index}"));
        Ok(())
    }

    async fn select_at(&self, point: Point, option: &str) -> Result<(), DriverError> {
        let (page, index, element) = self.element_at(point)?;
        if !element.options.is_empty()
            && !element
                .options
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(option))
        {
            return Err(DriverError::OptionNotFound(format!(
                "'{option}' is not an option of element {index}"
            )));
        }
        let mut state = self.state.lock();
        state.values.insert((page, index), option.to_string());
        state.log.push(format!("select#{index}"));
        Ok(())
    }

    async fn drag(&self, from: Point, to: Point) -> Result<(), DriverError> {
        let (_, source, _) = self.element_at(from)?;
        let (_, target, _) = self.element_at(to)?;
        self.record(format!("drag#{source}->{target}"));
        Ok(())
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.scroll.0 = state.scroll.0.saturating_add(dx);
        state.scroll.1 = state.scroll.1.saturating_add(dy).max(0);
        state.log.push(format!("scroll {dx},{dy}"));
        Ok(())
    }

    async fn element_present(&self, query: &str) -> Result<bool, DriverError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.find_by_label(query).is_some())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.current_page_url())
    }

    async fn current_title(&self) -> Result<Option<String>, DriverError> {
        let page = self.state.lock().page;
        Ok(self.fixture.pages[page].title.clone())
    }

    async fn read_text_at(&self, point: Point) -> Result<Option<String>, DriverError> {
        let (page, index, element) = self.element_at(point)?;
        let typed = self.state.lock().values.get(&(page, index)).cloned();
        Ok(typed.or_else(|| element.text.clone()))
    }

    async fn read_attribute_at(
        &self,
        point: Point,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let (_, _, element) = self.element_at(point)?;
        if name == "href" {
            if let Some(href) = &element.href {
                return Ok(Some(href.clone()));
            }
        }
        Ok(element.attributes.get(name).cloned())
    }
}

#[async_trait]
impl SnapshotProvider for ScriptedSurface {
    async fn snapshot(&self) -> Result<SurfaceSnapshot, DriverError> {
        let page = &self.fixture.pages[self.state.lock().page];
        let elements = page
            .elements
            .iter()
            .enumerate()
            .map(|(position, element)| {
                let index = position as u32;
                let mut info = ElementInfo::new(index, element.tag.clone()).with_bounds(bounds_for(index));
                if let Some(text) = &element.text {
                    info = info.with_text(text.clone());
                }
                if let Some(role) = &element.role {
                    info = info.with_role(role.clone());
                }
                for (name, value) in &element.attributes {
                    info = info.with_attribute(name.clone(), value.clone());
                }
                if let Some(href) = &element.href {
                    info = info.with_attribute("href", href.clone());
                }
                info
            })
            .collect();
        Ok(SurfaceSnapshot::new(page.url.clone(), page.title.clone(), elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SurfaceFixture {
        SurfaceFixture {
            start: "https://shop.test/".into(),
            pages: vec![
                FixturePage::new("https://shop.test", "Shop")
                    .with_element(FixtureElement::new("input").with_attribute("placeholder", "Search"))
                    .with_element(FixtureElement::new("a").with_text("Laptops").with_href("https://shop.test/laptops")),
                FixturePage::new("https://shop.test/laptops", "Laptops")
                    .with_element(FixtureElement::new("span").with_text("$999")),
            ],
        }
    }

    #[test]
    fn unknown_start_page_is_rejected() {
        let mut fixture = fixture();
        fixture.start = "https://elsewhere.test".into();
        assert!(matches!(
            ScriptedSurface::new(fixture),
            Err(DriverError::Navigation(_))
        ));
    }

    #[test]
    fn index_lookup_respects_row_gaps() {
        assert_eq!(index_at(Point { x: 100.0, y: 15.0 }), Some(0));
        assert_eq!(index_at(Point { x: 100.0, y: 55.0 }), Some(1));
        assert_eq!(index_at(Point { x: 100.0, y: 35.0 }), None);
        assert_eq!(index_at(Point { x: 300.0, y: 15.0 }), None);
    }

    #[tokio::test]
    async fn clicking_a_link_follows_it() {
        let surface = ScriptedSurface::new(fixture()).unwrap();
        let snapshot = surface.snapshot().await.unwrap();
        let link = snapshot.find_by_label("laptops").unwrap();
        let centre = link.bounds.unwrap().center();

        surface.click_at(centre).await.unwrap();

        assert_eq!(surface.current_page_url(), "https://shop.test/laptops");
        assert_eq!(surface.action_log(), vec!["click#1".to_string()]);
    }

    #[tokio::test]
    async fn filled_values_are_read_back() {
        let surface = ScriptedSurface::new(fixture()).unwrap();
        let point = bounds_for(0).center();
        surface.fill_at(point, "thinkpad").await.unwrap();
        assert_eq!(
            surface.read_text_at(point).await.unwrap().as_deref(),
            Some("thinkpad")
        );
        surface.clear_at(point).await.unwrap();
        assert_eq!(surface.read_text_at(point).await.unwrap(), None);
    }
}

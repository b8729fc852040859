//! Scripted in-memory driver for tests.
//!
//! Queries are answered from explicit routes (exact XPath string -> handles) instead of
//! evaluating XPath, so a test states exactly what the page "contains" for each locator the
//! code under test builds.

use crate::core::WebDriver;
use crate::errors::{QaError, Result};
use crate::node::identifier_xpath;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockHandle(pub usize);

#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub properties: HashMap<String, String>,
    pub text: String,
    pub text_content: Option<String>,
    pub displayed: bool,
    pub selected: bool,
    pub toggles_selection: bool,
    pub css: HashMap<String, String>,
    pub click_failures: u32,
    pub reveals: Vec<MockHandle>,
    pub detached: bool,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            displayed: true,
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Live DOM property, read ahead of the markup attribute of the same name
    pub fn prop(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    fn value_property(&mut self) -> &mut String {
        let initial = self.attributes.get("value").cloned().unwrap_or_default();
        self.properties.entry("value".to_string()).or_insert(initial)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn text_content(mut self, text: &str) -> Self {
        self.text_content = Some(text.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Clicking flips the selected state, like a checkbox or a multi-select option
    pub fn toggles(mut self) -> Self {
        self.toggles_selection = true;
        self
    }

    pub fn css(mut self, property: &str, value: &str) -> Self {
        self.css.insert(property.to_string(), value.to_string());
        self
    }

    /// The next `count` clicks fail as if the element were covered
    pub fn fail_clicks(mut self, count: u32) -> Self {
        self.click_failures = count;
        self
    }

    /// Clicking flips the visibility of `other`
    pub fn reveals(mut self, other: MockHandle) -> Self {
        self.reveals.push(other);
        self
    }

    fn outer_html(&self) -> String {
        let mut attributes: Vec<_> = self.attributes.iter().collect();
        attributes.sort();
        let rendered: String = attributes
            .iter()
            .map(|(k, v)| format!(" {}=\"{}\"", k, v))
            .collect();
        format!("<{0}{1}>{2}</{0}>", self.tag, rendered, self.text)
    }
}

#[derive(Debug, Default)]
struct MockState {
    elements: Vec<MockElement>,
    routes: HashMap<String, Vec<MockHandle>>,
    scoped_routes: HashMap<(MockHandle, String), Vec<MockHandle>>,
    script_results: Vec<(String, Value)>,
    navigations: Vec<String>,
    clicks: Vec<MockHandle>,
    hovers: Vec<MockHandle>,
    drags: Vec<(MockHandle, i64, i64)>,
    selections: Vec<(MockHandle, bool)>,
    scripts: Vec<(MockHandle, String)>,
    typed: Vec<(MockHandle, String)>,
    queries: Vec<String>,
    implicit_wait: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, element: MockElement) -> MockHandle {
        let mut state = self.state();
        state.elements.push(element);
        MockHandle(state.elements.len() - 1)
    }

    /// Answer `xpath` with `handles`, replacing any earlier route
    pub fn route(&self, xpath: impl Into<String>, handles: &[MockHandle]) {
        self.state().routes.insert(xpath.into(), handles.to_vec());
    }

    /// Answer `xpath` evaluated under `root` with `handles`
    pub fn route_in(&self, root: MockHandle, xpath: impl Into<String>, handles: &[MockHandle]) {
        self.state()
            .scoped_routes
            .insert((root, xpath.into()), handles.to_vec());
    }

    /// Add an element carrying `data-qa-id`, routed the way the identifier tree looks it up and
    /// included in page scans.
    pub fn add_identified(&self, identifier: &str, element: MockElement) -> MockHandle {
        let handle = self.add(element.attr("data-qa-id", identifier));
        let mut state = self.state();
        state
            .routes
            .entry(identifier_xpath("data-qa-id", identifier))
            .or_default()
            .push(handle);
        state
            .routes
            .entry("/descendant-or-self::*[@data-qa-id]".to_string())
            .or_default()
            .push(handle);
        handle
    }

    /// Return `value` from any script containing `fragment`
    pub fn script_result(&self, fragment: &str, value: Value) {
        self.state()
            .script_results
            .push((fragment.to_string(), value));
    }

    pub fn update(&self, handle: MockHandle, f: impl FnOnce(&mut MockElement)) {
        if let Some(element) = self.state().elements.get_mut(handle.0) {
            f(element);
        }
    }

    pub fn element(&self, handle: MockHandle) -> Option<MockElement> {
        self.state().elements.get(handle.0).cloned()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<MockHandle> {
        self.state().clicks.clone()
    }

    pub fn hovers(&self) -> Vec<MockHandle> {
        self.state().hovers.clone()
    }

    pub fn drags(&self) -> Vec<(MockHandle, i64, i64)> {
        self.state().drags.clone()
    }

    pub fn selections(&self) -> Vec<(MockHandle, bool)> {
        self.state().selections.clone()
    }

    pub fn scripts(&self) -> Vec<(MockHandle, String)> {
        self.state().scripts.clone()
    }

    pub fn typed(&self) -> Vec<(MockHandle, String)> {
        self.state().typed.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    pub fn implicit_wait(&self) -> Option<Duration> {
        self.state().implicit_wait
    }

    fn with_element<T>(
        &self,
        handle: &MockHandle,
        f: impl FnOnce(&mut MockElement) -> T,
    ) -> Result<T> {
        let mut state = self.state();
        match state.elements.get_mut(handle.0) {
            Some(element) if !element.detached => Ok(f(element)),
            _ => Err(QaError::StaleElement(format!("mock element {}", handle.0))),
        }
    }

    fn live(&self, handles: Option<&Vec<MockHandle>>) -> Vec<MockHandle> {
        let state = self.state();
        handles
            .map(|found| {
                found
                    .iter()
                    .filter(|h| state.elements.get(h.0).is_some_and(|e| !e.detached))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl WebDriver for MockDriver {
    type Element = MockHandle;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.state().navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().navigations.last().cloned().unwrap_or_default())
    }

    async fn find_elements(&self, xpath: &str) -> Result<Vec<Self::Element>> {
        if xpath.is_empty() {
            return Err(QaError::InvalidSelector("empty xpath".to_string()));
        }

        let found = {
            let mut state = self.state();
            state.queries.push(xpath.to_string());
            state.routes.get(xpath).cloned()
        };
        Ok(self.live(found.as_ref()))
    }

    async fn find_elements_in(
        &self,
        root: &Self::Element,
        xpath: &str,
    ) -> Result<Vec<Self::Element>> {
        self.with_element(root, |_| ())?;
        let found = self
            .state()
            .scoped_routes
            .get(&(*root, xpath.to_string()))
            .cloned();
        Ok(self.live(found.as_ref()))
    }

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>> {
        self.with_element(element, |e| match name {
            "textContent" => Some(e.text_content.clone().unwrap_or_else(|| e.text.clone())),
            "outerHTML" => Some(e.outer_html()),
            _ => e
                .properties
                .get(name)
                .or_else(|| e.attributes.get(name))
                .cloned(),
        })
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        self.with_element(element, |e| if e.displayed { e.text.clone() } else { String::new() })
    }

    async fn tag_name(&self, element: &Self::Element) -> Result<String> {
        self.with_element(element, |e| e.tag.clone())
    }

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool> {
        self.with_element(element, |e| e.displayed)
    }

    async fn is_selected(&self, element: &Self::Element) -> Result<bool> {
        self.with_element(element, |e| e.selected)
    }

    async fn css_value(&self, element: &Self::Element, property: &str) -> Result<String> {
        self.with_element(element, |e| e.css.get(property).cloned().unwrap_or_default())
    }

    async fn click(&self, element: &Self::Element) -> Result<()> {
        let reveals = self.with_element(element, |e| {
            if e.click_failures > 0 {
                e.click_failures -= 1;
                return Err(QaError::ElementNotInteractable(format!(
                    "mock element {} is covered",
                    element.0
                )));
            }
            if e.toggles_selection {
                e.selected = !e.selected;
            }
            Ok(e.reveals.clone())
        })??;

        let mut state = self.state();
        state.clicks.push(*element);
        for other in reveals {
            if let Some(target) = state.elements.get_mut(other.0) {
                target.displayed = !target.displayed;
            }
        }
        Ok(())
    }

    async fn clear(&self, element: &Self::Element) -> Result<()> {
        self.with_element(element, |e| e.value_property().clear())
    }

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<()> {
        self.with_element(element, |e| e.value_property().push_str(text))?;
        self.state().typed.push((*element, text.to_string()));
        Ok(())
    }

    async fn hover(&self, element: &Self::Element) -> Result<()> {
        self.with_element(element, |_| ())?;
        self.state().hovers.push(*element);
        Ok(())
    }

    async fn drag_by(&self, element: &Self::Element, x_offset: i64, y_offset: i64) -> Result<()> {
        self.with_element(element, |_| ())?;
        self.state().drags.push((*element, x_offset, y_offset));
        Ok(())
    }

    async fn call_function(&self, element: &Self::Element, function: &str) -> Result<Value> {
        self.with_element(element, |_| ())?;
        let mut state = self.state();
        state.scripts.push((*element, function.to_string()));
        let result = state
            .script_results
            .iter()
            .find(|(fragment, _)| function.contains(fragment.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null);
        Ok(result)
    }

    async fn set_selected(&self, option: &Self::Element, selected: bool) -> Result<()> {
        self.with_element(option, |e| e.selected = selected)?;
        self.state().selections.push((*option, selected));
        Ok(())
    }

    async fn set_implicit_wait(&self, timeout: Duration) -> Result<()> {
        self.state().implicit_wait = Some(timeout);
        Ok(())
    }
}

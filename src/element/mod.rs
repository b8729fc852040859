//! Element wrappers.
//!
//! An [`Element`] holds a locator (or a raw driver handle) and a shared driver. It never keeps a
//! live page node: each call resolves the locator against the page again. Typed wrappers add
//! capability traits on top of it.

use crate::core::{Config, WaitCondition, WebDriver};
use crate::errors::{QaError, Result};
use crate::locator::{join, By, Locator};
use crate::node::naming::attribute_name;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Declare a typed element: a newtype over [`Element`] carrying a fixed capability set.
macro_rules! element_type {
    ($(#[$meta:meta])* $name:ident => $kind:ident, [$($capability:ident),*]) => {
        $(#[$meta])*
        pub struct $name<D: WebDriver>(Element<D>);

        impl<D: WebDriver> Clone for $name<D> {
            fn clone(&self) -> Self {
                Self(self.0.clone())
            }
        }

        impl<D: WebDriver> std::fmt::Debug for $name<D> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl<D: WebDriver> AsElement<D> for $name<D> {
            fn as_element(&self) -> &Element<D> {
                &self.0
            }
        }

        impl<D: WebDriver> ElementType<D> for $name<D> {
            const KIND: ElementKind = ElementKind::$kind;

            fn from_element(element: Element<D>) -> Self {
                Self(element)
            }
        }

        impl<D: WebDriver> std::ops::Deref for $name<D> {
            type Target = Element<D>;

            fn deref(&self) -> &Element<D> {
                &self.0
            }
        }

        $(impl<D: WebDriver> $capability<D> for $name<D> {})*
    };
}

pub mod capabilities;
pub mod registry;
mod select;
pub mod types;
pub mod widgets;

pub use capabilities::{
    AsElement, Clickable, InputAccepting, Selectable, SingleChoice, TextBearing,
};
pub use registry::{
    lookup, registry, Capability, ElementKind, ElementType, TypeRegistry, TypedElement,
    DEFAULT_TYPE,
};
pub use types::{Button, Div, Image, InputCheckbox, InputRadio, InputText, Link, Select, Text};
pub use widgets::{BadgeDropdown, Dropdown, Form, FormField, MultiSelect};

const SCROLL_TO_SCRIPT: &str = "function() { \
    var vHeight = Math.max(document.documentElement.clientHeight, window.innerHeight || 0); \
    var eTop = this.getBoundingClientRect().top; \
    window.scrollBy(0, eTop - (vHeight / 2)); }";

/// What an element points at
#[derive(Debug, Clone)]
pub enum Target<E> {
    Locator(Locator),
    /// A node the driver already resolved; used as-is, never searched for
    Handle(E),
}

impl<D: WebDriver> From<&Element<D>> for Target<D::Element> {
    fn from(element: &Element<D>) -> Self {
        element.target.clone()
    }
}

/// Drop non-ASCII characters, trimming surrounding whitespace when `clean` is set
pub fn encode_ascii(text: &str, clean: bool) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    if clean {
        ascii.trim().to_string()
    } else {
        ascii
    }
}

pub struct Element<D: WebDriver> {
    driver: Arc<D>,
    config: Arc<Config>,
    target: Target<D::Element>,
}

impl<D: WebDriver> Clone for Element<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            config: self.config.clone(),
            target: self.target.clone(),
        }
    }
}

impl<D: WebDriver> std::fmt::Debug for Element<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element").field("target", &self.target).finish()
    }
}

impl<D: WebDriver> Element<D> {
    pub fn new(driver: Arc<D>, config: Arc<Config>, by: By, value: &str) -> Self {
        Self::from_locator(driver, config, &Locator::new(by, value))
    }

    pub fn from_locator(driver: Arc<D>, config: Arc<Config>, locator: &Locator) -> Self {
        Self {
            driver,
            config,
            target: Target::Locator(locator.normalized()),
        }
    }

    pub fn from_handle(driver: Arc<D>, config: Arc<Config>, handle: D::Element) -> Self {
        Self {
            driver,
            config,
            target: Target::Handle(handle),
        }
    }

    /// Locator targets are normalized, handles are kept as they are
    pub fn from_target(driver: Arc<D>, config: Arc<Config>, target: Target<D::Element>) -> Self {
        match target {
            Target::Locator(locator) => Self::from_locator(driver, config, &locator),
            Target::Handle(handle) => Self::from_handle(driver, config, handle),
        }
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn target(&self) -> &Target<D::Element> {
        &self.target
    }

    /// The normalized locator, `None` for raw handles
    pub fn locator(&self) -> Option<&Locator> {
        match &self.target {
            Target::Locator(locator) => Some(locator),
            Target::Handle(_) => None,
        }
    }

    /// Another element sharing this one's driver
    pub fn with_locator(&self, locator: &Locator) -> Element<D> {
        Element::from_locator(self.driver.clone(), self.config.clone(), locator)
    }

    /// An element searched for under this one.
    ///
    /// Raw handles cannot be joined with a path; scoping under one yields a locator that
    /// matches nothing.
    pub fn scoped(&self, xpath: &str) -> Element<D> {
        let locator = match &self.target {
            Target::Locator(locator) => join([locator, &Locator::xpath(xpath)]),
            Target::Handle(_) => Locator::xpath(""),
        };
        self.with_locator(&locator)
    }

    /// Resolve against the live page, first match wins
    pub async fn element(&self) -> Result<Option<D::Element>> {
        let locator = match &self.target {
            Target::Handle(handle) => return Ok(Some(handle.clone())),
            Target::Locator(locator) => locator,
        };

        if locator.is_empty() {
            return Ok(None);
        }

        match self.driver.find_elements(&locator.value).await {
            Ok(found) => Ok(found.into_iter().next()),
            Err(QaError::InvalidSelector(e)) => {
                debug!("invalid selector {}: {}", locator, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.element().await?.is_some())
    }

    /// True when the element carries the DOM attribute at all
    pub async fn has_attribute(&self, attribute: &str) -> Result<bool> {
        match &self.target {
            Target::Handle(handle) => {
                let query = format!("self::*[@{}]", attribute);
                Ok(!self.driver.find_elements_in(handle, &query).await?.is_empty())
            }
            Target::Locator(_) => {
                if !self.exists().await? {
                    return Ok(false);
                }
                let carrier = self.scoped(&format!("/self::*[boolean(@{})]", attribute));
                carrier.exists().await
            }
        }
    }

    /// Read a DOM attribute by member-style name (`class_`, `data_qa_id`).
    ///
    /// Empty when the element is not on the page or the attribute is unset.
    pub async fn get_attribute(&self, name: &str) -> Result<String> {
        let element = match self.element().await? {
            Some(element) => element,
            None => return Ok(String::new()),
        };

        let value = self
            .driver
            .attribute(&element, &attribute_name(name))
            .await?
            .unwrap_or_default();
        Ok(encode_ascii(&value, false))
    }

    /// HTML of the element, empty when absent
    pub async fn outer_html(&self) -> Result<String> {
        match self.element().await? {
            Some(element) => {
                let html = self.driver.attribute(&element, "outerHTML").await?;
                Ok(encode_ascii(&html.unwrap_or_default(), false))
            }
            None => Ok(String::new()),
        }
    }

    /// Read `expression` from the AngularJS scope bound to the element
    pub async fn angular_scope(&self, expression: &str) -> Result<Option<Value>> {
        let element = match self.element().await? {
            Some(element) => element,
            None => return Ok(None),
        };

        let function = format!(
            "function() {{ return angular.element(this).scope().{}; }}",
            expression
        );
        match self.driver.call_function(&element, &function).await {
            Ok(value) => Ok(Some(value)),
            Err(QaError::JavaScriptFailed(e)) => {
                debug!("angular scope lookup failed: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Move focus away from the element; only acts on a displayed element
    pub async fn blur(&self) -> Result<bool> {
        self.call_when_displayed("function() { this.blur(); }").await
    }

    /// Give the element focus; only acts on a displayed element
    pub async fn focus(&self) -> Result<bool> {
        self.call_when_displayed("function() { this.focus(); }").await
    }

    async fn call_when_displayed(&self, function: &str) -> Result<bool> {
        if !self.is_displayed().await? {
            return Ok(false);
        }
        match self.element().await? {
            Some(element) => {
                self.driver.call_function(&element, function).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn css_property(&self, property: &str) -> Result<Option<String>> {
        match self.element().await? {
            Some(element) => {
                let value = self.driver.css_value(&element, property).await?;
                Ok(Some(encode_ascii(&value, false)))
            }
            None => Ok(None),
        }
    }

    /// Drag the element by an offset from its center
    pub async fn drag(&self, x_offset: i64, y_offset: i64) -> Result<bool> {
        match self.element().await? {
            Some(element) => {
                self.driver.drag_by(&element, x_offset, y_offset).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn parent(&self) -> Element<D> {
        self.scoped("/parent::*")
    }

    /// Scroll so the element sits in the middle of the viewport
    pub async fn scroll_to(&self) -> Result<bool> {
        match self.element().await? {
            Some(element) => {
                self.driver.call_function(&element, SCROLL_TO_SCRIPT).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn tag_name(&self) -> Result<String> {
        match self.element().await? {
            Some(element) => Ok(encode_ascii(&self.driver.tag_name(&element).await?, false)),
            None => Ok(String::new()),
        }
    }

    pub async fn is_displayed(&self) -> Result<bool> {
        match self.element().await? {
            Some(element) => self.driver.is_displayed(&element).await,
            None => Ok(false),
        }
    }

    pub async fn is_disabled(&self) -> Result<bool> {
        self.has_attribute("disabled").await
    }

    /// Wait until the element is in the DOM; `false` on timeout
    pub async fn wait_until_present(&self, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Presence, timeout).await
    }

    /// Wait until the element is displayed; `false` on timeout
    pub async fn wait_until_appears(&self, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Visibility, timeout).await
    }

    /// Wait until the element is hidden or gone; `false` on timeout
    pub async fn wait_until_disappears(&self, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Invisibility, timeout).await
    }

    async fn wait_until(&self, condition: WaitCondition, timeout: Duration) -> Result<bool> {
        match &self.target {
            Target::Locator(locator) => {
                self.driver
                    .wait_until(
                        condition,
                        &locator.value,
                        timeout,
                        self.config.wait.poll_interval(),
                    )
                    .await
            }
            Target::Handle(_) => Ok(false),
        }
    }

    /// Default timeout for waits issued on behalf of this element
    pub fn default_timeout(&self) -> Duration {
        self.config.wait.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDriver, MockElement};
    use std::time::Instant;

    fn element(driver: &Arc<MockDriver>, xpath: &str) -> Element<MockDriver> {
        Element::new(driver.clone(), Arc::new(Config::default()), By::XPath, xpath)
    }

    #[tokio::test]
    async fn test_missing_element_degrades_to_defaults() {
        let driver = Arc::new(MockDriver::new());
        let missing = element(&driver, "//nothing");

        assert!(!missing.exists().await.unwrap());
        assert_eq!(missing.get_attribute("href").await.unwrap(), "");
        assert!(!missing.is_displayed().await.unwrap());
        assert!(!missing.focus().await.unwrap());
        assert!(!missing.blur().await.unwrap());
        assert!(!missing.scroll_to().await.unwrap());
        assert!(!missing.drag(10, 10).await.unwrap());
        assert_eq!(missing.css_property("color").await.unwrap(), None);
        assert_eq!(missing.tag_name().await.unwrap(), "");
        assert_eq!(missing.outer_html().await.unwrap(), "");
        assert_eq!(missing.angular_scope("model").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_element_resolves_first_match_each_call() {
        let driver = Arc::new(MockDriver::new());
        let first = driver.add(MockElement::new("li"));
        let second = driver.add(MockElement::new("li"));
        driver.route("//li", &[first, second]);

        let item = element(&driver, "//li");
        assert_eq!(item.element().await.unwrap(), Some(first));

        driver.update(first, |e| e.detached = true);
        assert_eq!(item.element().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_raw_handle_bypasses_search() {
        let driver = Arc::new(MockDriver::new());
        let handle = driver.add(MockElement::new("span").attr("title", "hi"));
        let raw = Element::from_handle(driver.clone(), Arc::new(Config::default()), handle);

        assert_eq!(raw.element().await.unwrap(), Some(handle));
        assert_eq!(raw.get_attribute("title").await.unwrap(), "hi");
        assert!(raw.locator().is_none());
        assert!(driver.queries().is_empty());
        assert!(!raw.wait_until_present(Duration::from_millis(10)).await.unwrap());
        assert!(raw.scoped("/span").locator().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_handle_attribute_presence_ignores_properties() {
        let driver = Arc::new(MockDriver::new());
        let handle = driver.add(
            MockElement::new("input")
                .attr("title", "hi")
                .prop("value", "typed"),
        );
        driver.route_in(handle, "self::*[@title]", &[handle]);
        let raw = Element::from_handle(driver.clone(), Arc::new(Config::default()), handle);

        assert!(raw.has_attribute("title").await.unwrap());
        assert_eq!(raw.get_attribute("value").await.unwrap(), "typed");
        assert!(!raw.has_attribute("value").await.unwrap());
    }

    #[tokio::test]
    async fn test_element_from_another_element_keeps_its_target() {
        let driver = Arc::new(MockDriver::new());
        let config = Arc::new(Config::default());
        let handle = driver.add(MockElement::new("span"));
        driver.route("//span", &[handle]);

        let located = element(&driver, "//span");
        let copy = Element::from_target(driver.clone(), config.clone(), (&located).into());
        assert_eq!(copy.locator(), located.locator());

        let raw = Element::from_handle(driver.clone(), config.clone(), handle);
        let copy = Element::from_target(driver.clone(), config, (&raw).into());
        assert!(copy.locator().is_none());
        assert_eq!(copy.element().await.unwrap(), Some(handle));

        let css = Target::Locator(Locator::new(By::CssSelector, "span"));
        let normalized = Element::from_target(driver.clone(), Arc::new(Config::default()), css);
        assert_eq!(normalized.locator().unwrap().by, By::XPath);
    }

    #[tokio::test]
    async fn test_class_attribute_via_keyword_alias() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(
            MockElement::new("div")
                .attr("class", "foo")
                .attr("data-qa-model", "div"),
        );
        driver.route("//div", &[h]);

        let div = element(&driver, "//div");
        assert_eq!(div.get_attribute("class_").await.unwrap(), "foo");
        assert_eq!(div.get_attribute("data_qa_model").await.unwrap(), "div");
    }

    #[tokio::test]
    async fn test_attribute_values_are_ascii() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div").attr("title", "café "));
        driver.route("//div", &[h]);

        assert_eq!(
            element(&driver, "//div").get_attribute("title").await.unwrap(),
            "caf "
        );
    }

    #[tokio::test]
    async fn test_has_attribute_checks_self_axis() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("button").attr("disabled", ""));
        driver.route("//button", &[h]);
        driver.route("//button/self::*[boolean(@disabled)]", &[h]);

        let button = element(&driver, "//button");
        assert!(button.is_disabled().await.unwrap());
        assert!(!button.has_attribute("hidden").await.unwrap());
    }

    #[tokio::test]
    async fn test_focus_and_blur_only_when_displayed() {
        let driver = Arc::new(MockDriver::new());
        let shown = driver.add(MockElement::new("input"));
        let hidden = driver.add(MockElement::new("input").hidden());
        driver.route("//shown", &[shown]);
        driver.route("//hidden", &[hidden]);

        assert!(element(&driver, "//shown").focus().await.unwrap());
        assert!(element(&driver, "//shown").blur().await.unwrap());
        assert!(!element(&driver, "//hidden").focus().await.unwrap());

        let scripts = driver.scripts();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].1.contains("this.focus()"));
        assert!(scripts[1].1.contains("this.blur()"));
    }

    #[tokio::test]
    async fn test_drag_scroll_and_css() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div").css("color", "red"));
        driver.route("//div", &[h]);
        let div = element(&driver, "//div");

        assert!(div.drag(5, -3).await.unwrap());
        assert_eq!(driver.drags(), vec![(h, 5, -3)]);
        assert!(div.scroll_to().await.unwrap());
        assert!(driver.scripts()[0].1.contains("window.scrollBy"));
        assert_eq!(div.css_property("color").await.unwrap().as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn test_parent_joins_parent_axis() {
        let driver = Arc::new(MockDriver::new());
        let div = element(&driver, "//div");
        assert_eq!(div.parent().locator().unwrap().value, "//div/parent::*");
    }

    #[tokio::test]
    async fn test_angular_scope_reads_script_result() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div"));
        driver.route("//div", &[h]);
        driver.script_result("scope().user.name", Value::String("ada".to_string()));

        let value = element(&driver, "//div")
            .angular_scope("user.name")
            .await
            .unwrap();
        assert_eq!(value, Some(Value::String("ada".to_string())));
    }

    #[tokio::test]
    async fn test_wait_until_appears_times_out_without_error() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div").hidden());
        driver.route("//div", &[h]);

        let started = Instant::now();
        let appeared = element(&driver, "//div")
            .wait_until_appears(Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!appeared);
        assert!(started.elapsed() >= Duration::from_millis(950));
    }

    #[tokio::test]
    async fn test_wait_until_present_and_disappears() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div"));
        driver.route("//div", &[h]);
        let div = element(&driver, "//div");

        assert!(div.wait_until_present(Duration::from_millis(100)).await.unwrap());
        driver.update(h, |e| e.displayed = false);
        assert!(div.wait_until_disappears(Duration::from_millis(100)).await.unwrap());
    }

    #[test]
    fn test_encode_ascii() {
        assert_eq!(encode_ascii("  naïve  ", false), "  nave  ");
        assert_eq!(encode_ascii("  naïve  ", true), "nave");
    }
}

use crate::errors::{QaError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Page state an explicit wait can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one node matches the selector.
    Presence,
    /// The first match exists and is displayed.
    Visibility,
    /// Nothing matches, or the first match is hidden.
    Invisibility,
}

/// The browser automation driver this crate sits on.
///
/// Every selector handed to a driver is XPath. Element handles are opaque to the rest of the
/// crate; a handle may go stale when the page changes, in which case the driver reports
/// [`QaError::StaleElement`].
#[async_trait]
pub trait WebDriver: Send + Sync {
    type Element: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Navigate the session to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Get current URL
    async fn current_url(&self) -> Result<String>;

    /// Find every node matching an XPath, in document order
    async fn find_elements(&self, xpath: &str) -> Result<Vec<Self::Element>>;

    /// Find nodes matching an XPath evaluated relative to `root`
    async fn find_elements_in(&self, root: &Self::Element, xpath: &str)
        -> Result<Vec<Self::Element>>;

    /// Read an attribute, falling back to the DOM property of the same name
    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Rendered text of the element
    async fn text(&self, element: &Self::Element) -> Result<String>;

    async fn tag_name(&self, element: &Self::Element) -> Result<String>;

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool>;

    async fn is_selected(&self, element: &Self::Element) -> Result<bool>;

    async fn css_value(&self, element: &Self::Element, property: &str) -> Result<String>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn clear(&self, element: &Self::Element) -> Result<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<()>;

    /// Move the pointer over the element
    async fn hover(&self, element: &Self::Element) -> Result<()>;

    /// Press on the element, move by an offset and release
    async fn drag_by(&self, element: &Self::Element, x_offset: i64, y_offset: i64) -> Result<()>;

    /// Run a JavaScript function declaration with `this` bound to the element
    async fn call_function(&self, element: &Self::Element, function: &str) -> Result<Value>;

    /// Select or deselect an `<option>` and notify its `<select>`
    async fn set_selected(&self, option: &Self::Element, selected: bool) -> Result<()>;

    async fn set_implicit_wait(&self, timeout: Duration) -> Result<()>;

    /// Block until `condition` holds for `xpath` or `timeout` expires.
    ///
    /// Returns `Ok(false)` on timeout. Drivers with a native explicit wait override this; the
    /// default polls every `poll_interval`.
    async fn wait_until(
        &self,
        condition: WaitCondition,
        xpath: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool> {
        poll_until(self, condition, xpath, timeout, poll_interval).await
    }

    /// Evaluate a wait condition once
    async fn check_condition(&self, condition: WaitCondition, xpath: &str) -> Result<bool> {
        let found = match self.find_elements(xpath).await {
            Ok(found) => found,
            Err(QaError::InvalidSelector(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let first = match found.first() {
            Some(first) => first,
            None => return Ok(condition == WaitCondition::Invisibility),
        };

        match condition {
            WaitCondition::Presence => Ok(true),
            WaitCondition::Visibility => match self.is_displayed(first).await {
                Ok(displayed) => Ok(displayed),
                Err(QaError::StaleElement(_)) => Ok(false),
                Err(e) => Err(e),
            },
            WaitCondition::Invisibility => match self.is_displayed(first).await {
                Ok(displayed) => Ok(!displayed),
                Err(QaError::StaleElement(_)) => Ok(true),
                Err(e) => Err(e),
            },
        }
    }
}

/// Poll [`WebDriver::check_condition`] until it holds or `timeout` runs out
pub async fn poll_until<D: WebDriver + ?Sized>(
    driver: &D,
    condition: WaitCondition,
    xpath: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;

    loop {
        if driver.check_condition(condition, xpath).await? {
            return Ok(true);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }

        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

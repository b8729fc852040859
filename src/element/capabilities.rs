//! Capability traits shared by typed elements.
//!
//! Each trait only needs [`AsElement`]; all behavior lives in default methods, so a typed
//! element opts in with an empty `impl`.

use super::select::SelectControl;
use super::{encode_ascii, Element};
use crate::core::WebDriver;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::debug;

/// Access to the wrapped base element
pub trait AsElement<D: WebDriver>: Send + Sync {
    fn as_element(&self) -> &Element<D>;
}

impl<D: WebDriver> AsElement<D> for Element<D> {
    fn as_element(&self) -> &Element<D> {
        self
    }
}

#[async_trait]
pub trait Clickable<D: WebDriver>: AsElement<D> + Sync {
    /// Click, retrying once after scrolling the element into view
    async fn click(&self) -> Result<bool> {
        let base = self.as_element();
        let element = match base.element().await? {
            Some(element) => element,
            None => return Ok(false),
        };

        match base.driver().click(&element).await {
            Ok(()) => return Ok(true),
            Err(e) => debug!("click on {:?} failed, scrolling and retrying: {}", base, e),
        }

        if let Err(e) = base.scroll_to().await {
            debug!("scroll before retry failed: {}", e);
        }

        let element = match base.element().await? {
            Some(element) => element,
            None => return Ok(false),
        };
        match base.driver().click(&element).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("click on {:?} failed again, giving up: {}", base, e);
                Ok(false)
            }
        }
    }

    async fn hover(&self) -> Result<bool> {
        let base = self.as_element();
        match base.element().await? {
            Some(element) => {
                base.driver().hover(&element).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
pub trait TextBearing<D: WebDriver>: AsElement<D> + Sync {
    /// Full text content, hidden parts included
    async fn text(&self) -> Result<String> {
        let base = self.as_element();
        match base.element().await? {
            Some(element) => {
                let text = base.driver().attribute(&element, "textContent").await?;
                Ok(encode_ascii(&text.unwrap_or_default(), true))
            }
            None => Ok(String::new()),
        }
    }

    /// Text as rendered, empty for hidden elements
    async fn visible_text(&self) -> Result<String> {
        let base = self.as_element();
        match base.element().await? {
            Some(element) => Ok(encode_ascii(&base.driver().text(&element).await?, true)),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
pub trait InputAccepting<D: WebDriver>: AsElement<D> + Sync {
    /// Type into the element, clearing it first when `clear` is set
    async fn input(&self, text: &str, clear: bool) -> Result<bool> {
        let base = self.as_element();
        let element = match base.element().await? {
            Some(element) => element,
            None => return Ok(false),
        };

        if clear {
            base.driver().clear(&element).await?;
        }
        base.driver().send_keys(&element, text).await?;
        Ok(true)
    }

    async fn value(&self) -> Result<String> {
        self.as_element().get_attribute("value").await
    }
}

/// Native `<select>` handling; `false` when the element is absent or not a select
#[async_trait]
pub trait Selectable<D: WebDriver>: AsElement<D> + Sync {
    async fn select_by_index(&self, index: usize) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.select_by_index(index).await,
            None => Ok(false),
        }
    }

    async fn select_by_text(&self, text: &str) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.select_by_text(text).await,
            None => Ok(false),
        }
    }

    async fn select_by_value(&self, value: &str) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.select_by_value(value).await,
            None => Ok(false),
        }
    }

    async fn deselect_by_index(&self, index: usize) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.deselect_by_index(index).await,
            None => Ok(false),
        }
    }

    async fn deselect_by_text(&self, text: &str) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.deselect_by_text(text).await,
            None => Ok(false),
        }
    }

    async fn deselect_by_value(&self, value: &str) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.deselect_by_value(value).await,
            None => Ok(false),
        }
    }

    async fn deselect_all(&self) -> Result<bool> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.deselect_all().await,
            None => Ok(false),
        }
    }

    async fn options(&self) -> Result<Vec<String>> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.option_texts(false).await,
            None => Ok(Vec::new()),
        }
    }

    async fn selected_options(&self) -> Result<Vec<String>> {
        match SelectControl::from_element(self.as_element()).await? {
            Some(control) => control.option_texts(true).await,
            None => Ok(Vec::new()),
        }
    }

    async fn selected_first(&self) -> Result<Option<String>> {
        Ok(self.selected_options().await?.into_iter().next())
    }
}

/// Checkbox and radio behavior
#[async_trait]
pub trait SingleChoice<D: WebDriver>: Clickable<D> + Sync {
    async fn selected(&self) -> Result<bool> {
        let base = self.as_element();
        match base.element().await? {
            Some(element) => base.driver().is_selected(&element).await,
            None => Ok(false),
        }
    }

    /// Make sure the element is selected; clicks only when it is not
    async fn select(&self) -> Result<bool> {
        if self.selected().await? {
            return Ok(true);
        }
        self.click().await
    }

    /// Make sure the element is not selected; clicks only when it is
    async fn deselect(&self) -> Result<bool> {
        if !self.as_element().exists().await? {
            return Ok(false);
        }
        if !self.selected().await? {
            return Ok(true);
        }
        self.click().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::element::{Button, ElementType, InputCheckbox, InputText, Select, Text};
    use crate::locator::By;
    use crate::testing::{MockDriver, MockElement};
    use std::sync::Arc;

    fn typed<T: ElementType<MockDriver>>(driver: &Arc<MockDriver>, xpath: &str) -> T {
        T::from_element(Element::new(
            driver.clone(),
            Arc::new(Config::default()),
            By::XPath,
            xpath,
        ))
    }

    #[tokio::test]
    async fn test_click_retries_once_after_scroll() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("button").fail_clicks(1));
        driver.route("//button", &[h]);

        let button: Button<_> = typed(&driver, "//button");
        assert!(button.click().await.unwrap());
        assert_eq!(driver.clicks(), vec![h]);
        assert!(driver.scripts()[0].1.contains("window.scrollBy"));
    }

    #[tokio::test]
    async fn test_click_gives_up_after_second_failure() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("button").fail_clicks(2));
        driver.route("//button", &[h]);

        let button: Button<_> = typed(&driver, "//button");
        assert!(!button.click().await.unwrap());
        assert!(driver.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_click_and_hover_on_missing_element() {
        let driver = Arc::new(MockDriver::new());
        let button: Button<_> = typed(&driver, "//button");

        assert!(!button.click().await.unwrap());
        assert!(!button.hover().await.unwrap());
    }

    #[tokio::test]
    async fn test_text_versus_visible_text() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(
            MockElement::new("span")
                .text("  Hello ")
                .text_content("  Hello wörld ")
                .hidden(),
        );
        driver.route("//span", &[h]);

        let text: Text<_> = typed(&driver, "//span");
        assert_eq!(text.text().await.unwrap(), "Hello wrld");
        assert_eq!(text.visible_text().await.unwrap(), "");

        driver.update(h, |e| e.displayed = true);
        assert_eq!(text.visible_text().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_input_clears_then_types() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("input").attr("value", "old"));
        driver.route("//input", &[h]);

        let field: InputText<_> = typed(&driver, "//input");
        assert!(field.input("new", true).await.unwrap());
        assert_eq!(field.value().await.unwrap(), "new");
        assert!(field.input("er", false).await.unwrap());
        assert_eq!(field.value().await.unwrap(), "newer");
        assert_eq!(driver.element(h).unwrap().attributes["value"], "old");
    }

    #[tokio::test]
    async fn test_checkbox_select_is_idempotent() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("input").attr("type", "checkbox").toggles());
        driver.route("//input", &[h]);

        let checkbox: InputCheckbox<_> = typed(&driver, "//input");
        assert!(!checkbox.selected().await.unwrap());
        assert!(checkbox.select().await.unwrap());
        assert!(checkbox.select().await.unwrap());
        assert!(checkbox.selected().await.unwrap());
        assert_eq!(driver.clicks().len(), 1);

        assert!(checkbox.deselect().await.unwrap());
        assert!(checkbox.deselect().await.unwrap());
        assert!(!checkbox.selected().await.unwrap());
        assert_eq!(driver.clicks().len(), 2);
    }

    #[tokio::test]
    async fn test_select_on_non_select_element_is_false() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("div"));
        driver.route("//div", &[h]);

        let select: Select<_> = typed(&driver, "//div");
        assert!(!select.select_by_index(0).await.unwrap());
        assert!(select.options().await.unwrap().is_empty());
        assert_eq!(select.selected_first().await.unwrap(), None);
    }
}

use super::{encode_ascii, Element};
use crate::core::WebDriver;
use crate::errors::Result;

/// Option handling for a resolved `<select>` node.
///
/// Option state is set directly on the `<option>` instead of clicking it, and only when it
/// differs from the requested one.
pub(crate) struct SelectControl<'a, D: WebDriver> {
    driver: &'a D,
    element: D::Element,
}

fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl<'a, D: WebDriver> SelectControl<'a, D> {
    /// `None` unless the element resolves to a `<select>`
    pub async fn from_element(base: &'a Element<D>) -> Result<Option<SelectControl<'a, D>>> {
        let element = match base.element().await? {
            Some(element) => element,
            None => return Ok(None),
        };

        let driver = base.driver().as_ref();
        if !driver.tag_name(&element).await?.eq_ignore_ascii_case("select") {
            return Ok(None);
        }

        Ok(Some(SelectControl { driver, element }))
    }

    pub async fn is_multiple(&self) -> Result<bool> {
        let multiple = self.driver.attribute(&self.element, "multiple").await?;
        Ok(matches!(multiple.as_deref(), Some(value) if value != "false"))
    }

    async fn options(&self) -> Result<Vec<D::Element>> {
        self.driver.find_elements_in(&self.element, ".//option").await
    }

    async fn option_text(&self, option: &D::Element) -> Result<String> {
        let text = self.driver.attribute(option, "textContent").await?;
        Ok(normalize_space(&text.unwrap_or_default()))
    }

    async fn set_selected(&self, option: &D::Element, selected: bool) -> Result<()> {
        if self.driver.is_selected(option).await? != selected {
            self.driver.set_selected(option, selected).await?;
        }
        Ok(())
    }

    async fn matching_text(&self, text: &str) -> Result<Vec<D::Element>> {
        let wanted = normalize_space(text);
        let mut matched = Vec::new();
        for option in self.options().await? {
            if self.option_text(&option).await? == wanted {
                matched.push(option);
            }
        }
        Ok(matched)
    }

    async fn matching_value(&self, value: &str) -> Result<Vec<D::Element>> {
        let mut matched = Vec::new();
        for option in self.options().await? {
            if self.driver.attribute(&option, "value").await?.as_deref() == Some(value) {
                matched.push(option);
            }
        }
        Ok(matched)
    }

    /// Set `selected` on matched options; a single-selection list stops at the first
    async fn apply(&self, matched: Vec<D::Element>, selected: bool) -> Result<bool> {
        if matched.is_empty() {
            return Ok(false);
        }

        let multiple = self.is_multiple().await?;
        for option in &matched {
            self.set_selected(option, selected).await?;
            if !multiple {
                break;
            }
        }
        Ok(true)
    }

    pub async fn select_by_index(&self, index: usize) -> Result<bool> {
        let matched: Vec<_> = self.options().await?.into_iter().nth(index).into_iter().collect();
        self.apply(matched, true).await
    }

    pub async fn select_by_text(&self, text: &str) -> Result<bool> {
        let matched = self.matching_text(text).await?;
        self.apply(matched, true).await
    }

    pub async fn select_by_value(&self, value: &str) -> Result<bool> {
        let matched = self.matching_value(value).await?;
        self.apply(matched, true).await
    }

    pub async fn deselect_by_index(&self, index: usize) -> Result<bool> {
        if !self.is_multiple().await? {
            return Ok(false);
        }
        let matched: Vec<_> = self.options().await?.into_iter().nth(index).into_iter().collect();
        self.apply(matched, false).await
    }

    pub async fn deselect_by_text(&self, text: &str) -> Result<bool> {
        if !self.is_multiple().await? {
            return Ok(false);
        }
        let matched = self.matching_text(text).await?;
        self.apply(matched, false).await
    }

    pub async fn deselect_by_value(&self, value: &str) -> Result<bool> {
        if !self.is_multiple().await? {
            return Ok(false);
        }
        let matched = self.matching_value(value).await?;
        self.apply(matched, false).await
    }

    pub async fn deselect_all(&self) -> Result<bool> {
        if !self.is_multiple().await? {
            return Ok(false);
        }
        for option in self.options().await? {
            self.set_selected(&option, false).await?;
        }
        Ok(true)
    }

    /// Option texts, optionally only the selected ones
    pub async fn option_texts(&self, selected_only: bool) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for option in self.options().await? {
            if selected_only && !self.driver.is_selected(&option).await? {
                continue;
            }
            let text = self.option_text(&option).await?;
            texts.push(encode_ascii(&text, true));
        }
        Ok(texts)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::Config;
    use crate::element::{Element, ElementType, Select, Selectable};
    use crate::locator::By;
    use crate::testing::{MockDriver, MockElement, MockHandle};
    use std::sync::Arc;

    fn select_fixture(multiple: bool) -> (Arc<MockDriver>, Select<MockDriver>, Vec<MockHandle>) {
        let driver = Arc::new(MockDriver::new());
        let mut select = MockElement::new("select");
        if multiple {
            select = select.attr("multiple", "true");
        }
        let root = driver.add(select);
        let options: Vec<_> = [("r", "Red"), ("g", "Green"), ("b", "Blue")]
            .iter()
            .map(|(value, label)| {
                driver.add(MockElement::new("option").attr("value", value).text(label))
            })
            .collect();
        driver.route("//select", &[root]);
        driver.route_in(root, ".//option", &options);

        let element = Element::new(driver.clone(), Arc::new(Config::default()), By::XPath, "//select");
        (driver, Select::from_element(element), options)
    }

    #[tokio::test]
    async fn test_select_by_index_text_and_value() {
        let (driver, select, options) = select_fixture(true);

        assert!(select.select_by_index(0).await.unwrap());
        assert!(select.select_by_text("Green").await.unwrap());
        assert!(select.select_by_value("b").await.unwrap());
        assert_eq!(
            select.selected_options().await.unwrap(),
            vec!["Red", "Green", "Blue"]
        );
        assert!(options.iter().all(|h| driver.element(*h).unwrap().selected));
        assert!(driver.clicks().is_empty());

        assert!(select.select_by_text("Green").await.unwrap());
        assert_eq!(
            driver.selections(),
            options.iter().map(|h| (*h, true)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_missing_option_is_false() {
        let (_, select, _) = select_fixture(false);

        assert!(!select.select_by_index(7).await.unwrap());
        assert!(!select.select_by_text("Purple").await.unwrap());
        assert!(!select.select_by_value("p").await.unwrap());
    }

    #[tokio::test]
    async fn test_deselect_requires_multiple() {
        let (driver, select, _) = select_fixture(false);

        assert!(select.select_by_value("g").await.unwrap());
        assert!(!select.deselect_by_value("g").await.unwrap());
        assert!(!select.deselect_all().await.unwrap());
        assert_eq!(select.selected_first().await.unwrap().as_deref(), Some("Green"));
        assert_eq!(driver.selections().len(), 1);
        assert!(driver.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_deselect_all_on_multiple() {
        let (_, select, _) = select_fixture(true);

        select.select_by_index(1).await.unwrap();
        select.select_by_index(2).await.unwrap();
        assert!(select.deselect_by_index(1).await.unwrap());
        assert_eq!(select.selected_options().await.unwrap(), vec!["Blue"]);
        assert!(select.deselect_all().await.unwrap());
        assert!(select.selected_options().await.unwrap().is_empty());
        assert_eq!(
            select.options().await.unwrap(),
            vec!["Red", "Green", "Blue"]
        );
    }
}

//! Composite widgets built from typed sub-elements.

use super::{
    encode_ascii, AsElement, Button, Clickable, Div, Element, ElementKind, ElementType,
    InputAccepting, InputText, Select, TextBearing,
};
use crate::core::WebDriver;
use crate::errors::Result;
use crate::locator::{quote, Locator};
use tracing::warn;

const DROPDOWN_TOGGLE: &str = r#"/descendant-or-self::*[(contains(@class, "dropdown-toggle") or @ng-mouseover or @ng-click)]"#;
const DROPDOWN_MENU: &str = r#"*[(contains(@class, "dropdown-menu") or contains(@class, "tree") or @ng-show) and (self::div or self::ul)]"#;

element_type!(
    /// Bootstrap dropdown: a toggle plus a menu that is either its sibling or inside it
    Dropdown => Dropdown, [Clickable, TextBearing]
);

impl<D: WebDriver> Dropdown<D> {
    fn toggle(&self) -> Button<D> {
        Button::from_element(self.0.scoped(DROPDOWN_TOGGLE))
    }

    fn container(&self) -> Div<D> {
        let toggle = self.toggle();
        let locator = match toggle.locator() {
            Some(toggle) => Locator::xpath(format!(
                "{0}/following-sibling::{1}|{0}/descendant-or-self::{1}",
                toggle.value, DROPDOWN_MENU
            )),
            None => Locator::xpath(""),
        };
        Div::from_element(self.0.with_locator(&locator))
    }

    /// Click or hover the toggle, then wait for the menu to show
    pub async fn expand(&self, hover: bool) -> Result<bool> {
        let container = self.container();
        if container.is_displayed().await? {
            return Ok(true);
        }

        let toggle = self.toggle();
        if hover {
            toggle.hover().await?;
        } else {
            toggle.click().await?;
        }
        container.wait_until_appears(self.default_timeout()).await
    }

    pub async fn collapse(&self, hover: bool) -> Result<bool> {
        let container = self.container();
        if !container.is_displayed().await? {
            return Ok(true);
        }

        let toggle = self.toggle();
        if hover {
            toggle.hover().await?;
        } else {
            toggle.click().await?;
        }
        container.wait_until_disappears(self.default_timeout()).await
    }
}

element_type!(
    /// Dropdown opened by hovering its badge
    BadgeDropdown => BadgeDropdown, [Clickable, TextBearing]
);

impl<D: WebDriver> BadgeDropdown<D> {
    pub fn as_dropdown(&self) -> Dropdown<D> {
        Dropdown::from_element(self.0.clone())
    }

    pub async fn expand(&self, hover: bool) -> Result<bool> {
        self.as_dropdown().expand(hover).await
    }

    pub async fn collapse(&self, hover: bool) -> Result<bool> {
        self.as_dropdown().collapse(hover).await
    }

    pub async fn show(&self) -> Result<bool> {
        self.expand(true).await
    }

    pub async fn hide(&self) -> Result<bool> {
        self.collapse(true).await
    }
}

const MULTI_CONTAINER: &str = r#"/descendant-or-self::div[contains(@class, "checkboxLayer")]"#;
const MULTI_OPTION: &str = r#"/descendant-or-self::div[contains(@ng-repeat, "filteredModel")]"#;
const MULTI_OPTION_LABELS: &str =
    r#"/descendant-or-self::div[contains(@ng-repeat, "filteredModel")]//label"#;
const MULTI_SELECTED_LABELS: &str = r#"/descendant-or-self::div[contains(@ng-repeat, "filteredModel") and contains(@class, "selected")]//label"#;

fn helper_button(action: &str) -> String {
    format!(
        "/descendant-or-self::button[contains(@ng-click, {})]",
        quote(action)
    )
}

element_type!(
    /// isteven-multi-select widget
    MultiSelect => MultiSelect, []
);

impl<D: WebDriver> MultiSelect<D> {
    fn container(&self) -> Div<D> {
        Div::from_element(self.0.scoped(MULTI_CONTAINER))
    }

    fn button(&self, action: &str) -> Button<D> {
        Button::from_element(self.0.scoped(&helper_button(action)))
    }

    fn filter(&self) -> InputText<D> {
        InputText::from_element(
            self.0
                .scoped(r#"/descendant-or-self::input[contains(@ng-click, "filter")]"#),
        )
    }

    async fn option_at(&self, index: usize) -> Result<Option<Button<D>>> {
        if index >= self.options().await?.len() {
            return Ok(None);
        }
        let xpath = format!("{}[{}]", MULTI_OPTION, index + 1);
        Ok(Some(Button::from_element(self.0.scoped(&xpath))))
    }

    fn option_with_text(&self, text: &str) -> Button<D> {
        Button::from_element(self.0.scoped(&format!(
            "/descendant-or-self::label[contains(., {})]/ancestor::div[contains(@ng-repeat, \"filteredModel\")]",
            quote(text)
        )))
    }

    async fn is_option_selected(option: &Button<D>) -> Result<bool> {
        Ok(option
            .get_attribute("class_")
            .await?
            .split_whitespace()
            .any(|class| class == "selected"))
    }

    async fn set_option(&self, option: Option<Button<D>>, selected: bool) -> Result<bool> {
        let option = match option {
            Some(option) => option,
            None => return Ok(false),
        };
        if !option.exists().await? {
            return Ok(false);
        }

        if Self::is_option_selected(&option).await? == selected {
            return Ok(true);
        }
        option.click().await
    }

    pub async fn expand(&self) -> Result<bool> {
        let container = self.container();
        if container.is_displayed().await? {
            return Ok(true);
        }
        self.button("toggle").click().await?;
        container.wait_until_appears(self.default_timeout()).await
    }

    pub async fn collapse(&self) -> Result<bool> {
        let container = self.container();
        if !container.is_displayed().await? {
            return Ok(true);
        }
        self.button("toggle").click().await?;
        container.wait_until_disappears(self.default_timeout()).await
    }

    pub async fn select_all(&self) -> Result<bool> {
        self.expand().await?;
        self.button("all").click().await
    }

    pub async fn select_none(&self) -> Result<bool> {
        self.expand().await?;
        self.button("none").click().await
    }

    pub async fn reset(&self) -> Result<bool> {
        self.expand().await?;
        self.button("reset").click().await
    }

    pub async fn search(&self, value: &str, clear: bool) -> Result<bool> {
        self.expand().await?;
        self.filter().input(value, clear).await
    }

    pub async fn clear_search(&self) -> Result<bool> {
        self.expand().await?;
        self.button("clear").click().await
    }

    pub async fn select_by_index(&self, index: usize) -> Result<bool> {
        self.expand().await?;
        let option = self.option_at(index).await?;
        self.set_option(option, true).await
    }

    pub async fn select_by_text(&self, text: &str) -> Result<bool> {
        self.expand().await?;
        self.set_option(Some(self.option_with_text(text)), true).await
    }

    pub async fn deselect_by_index(&self, index: usize) -> Result<bool> {
        self.expand().await?;
        let option = self.option_at(index).await?;
        self.set_option(option, false).await
    }

    pub async fn deselect_by_text(&self, text: &str) -> Result<bool> {
        self.expand().await?;
        self.set_option(Some(self.option_with_text(text)), false).await
    }

    pub async fn options(&self) -> Result<Vec<String>> {
        self.label_texts(MULTI_OPTION_LABELS).await
    }

    pub async fn selected_options(&self) -> Result<Vec<String>> {
        self.label_texts(MULTI_SELECTED_LABELS).await
    }

    async fn label_texts(&self, xpath: &str) -> Result<Vec<String>> {
        let locator = match self.0.scoped(xpath).locator() {
            Some(locator) if !locator.is_empty() => locator.clone(),
            _ => return Ok(Vec::new()),
        };

        let driver = self.0.driver();
        let mut texts = Vec::new();
        for label in driver.find_elements(&locator.value).await? {
            let text = driver.attribute(&label, "textContent").await?;
            texts.push(encode_ascii(&text.unwrap_or_default(), false));
        }
        Ok(texts)
    }
}

/// A field found inside a [`Form`]
pub enum FormField<D: WebDriver> {
    Input(InputText<D>),
    Select(Select<D>),
}

impl<D: WebDriver> std::fmt::Debug for FormField<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormField::Input(input) => f.debug_tuple("Input").field(input).finish(),
            FormField::Select(select) => f.debug_tuple("Select").field(select).finish(),
        }
    }
}

impl<D: WebDriver> FormField<D> {
    pub fn as_element(&self) -> &Element<D> {
        match self {
            FormField::Input(input) => input.as_element(),
            FormField::Select(select) => select.as_element(),
        }
    }
}

element_type!(Form => Form, []);

impl<D: WebDriver> Form<D> {
    /// Text input, textarea or select by `name`
    pub async fn get_field(&self, name: &str) -> Result<Option<FormField<D>>> {
        let any_field = format!(
            r#"/descendant-or-self::*[((self::input and @type="text") or self::textarea or self::select) and @name={}]"#,
            quote(name)
        );
        let tag = match self.0.scoped(&any_field).element().await? {
            Some(field) => self.0.driver().tag_name(&field).await?.to_ascii_lowercase(),
            None => return Ok(None),
        };

        match tag.as_str() {
            "input" | "textarea" => {
                let xpath = format!(
                    r#"/descendant-or-self::*[((self::input and @type="text") or self::textarea) and @name={}]"#,
                    quote(name)
                );
                Ok(Some(FormField::Input(InputText::from_element(
                    self.0.scoped(&xpath),
                ))))
            }
            "select" => {
                let xpath = format!(
                    r#"/descendant-or-self::*[self::select and @name={}]"#,
                    quote(name)
                );
                Ok(Some(FormField::Select(Select::from_element(
                    self.0.scoped(&xpath),
                ))))
            }
            other => {
                warn!("{} type not currently supported within form", other);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::locator::By;
    use crate::testing::{MockDriver, MockElement, MockHandle};
    use std::sync::Arc;

    fn config() -> Arc<Config> {
        let mut config = Config::default();
        config.wait.timeout_ms = 200;
        config.wait.poll_interval_ms = 20;
        Arc::new(config)
    }

    fn root(driver: &Arc<MockDriver>, xpath: &str) -> Element<MockDriver> {
        Element::new(driver.clone(), config(), By::XPath, xpath)
    }

    #[tokio::test]
    async fn test_dropdown_expand_and_collapse() {
        let driver = Arc::new(MockDriver::new());
        let menu = driver.add(MockElement::new("ul").attr("class", "dropdown-menu").hidden());
        let toggle = driver.add(MockElement::new("button").reveals(menu));
        driver.route(format!("//x{}", DROPDOWN_TOGGLE), &[toggle]);
        driver.route(
            format!(
                "//x{0}/following-sibling::{1}|//x{0}/descendant-or-self::{1}",
                DROPDOWN_TOGGLE, DROPDOWN_MENU
            ),
            &[menu],
        );

        let dropdown = Dropdown::from_element(root(&driver, "//x"));
        assert!(dropdown.expand(false).await.unwrap());
        assert!(dropdown.expand(false).await.unwrap());
        assert_eq!(driver.clicks(), vec![toggle]);

        assert!(dropdown.collapse(false).await.unwrap());
        assert_eq!(driver.clicks().len(), 2);
        assert!(!driver.element(menu).unwrap().displayed);
    }

    #[tokio::test]
    async fn test_badge_dropdown_shows_on_hover() {
        let driver = Arc::new(MockDriver::new());
        let menu = driver.add(MockElement::new("div").attr("ng-show", "open"));
        let toggle = driver.add(MockElement::new("span"));
        driver.route(format!("//b{}", DROPDOWN_TOGGLE), &[toggle]);
        driver.route(
            format!(
                "//b{0}/following-sibling::{1}|//b{0}/descendant-or-self::{1}",
                DROPDOWN_TOGGLE, DROPDOWN_MENU
            ),
            &[menu],
        );

        let badge = BadgeDropdown::from_element(root(&driver, "//b"));
        assert!(badge.show().await.unwrap());
        assert!(driver.hovers().is_empty());

        driver.update(menu, |e| e.displayed = false);
        assert!(badge.hide().await.unwrap());
        assert!(driver.hovers().is_empty());

        // hovering this toggle never reveals the menu
        assert!(!badge.show().await.unwrap());
        assert_eq!(driver.hovers(), vec![toggle]);
    }

    fn multiselect_fixture() -> (Arc<MockDriver>, MultiSelect<MockDriver>, Vec<MockHandle>) {
        let driver = Arc::new(MockDriver::new());
        let layer = driver.add(MockElement::new("div").attr("class", "checkboxLayer"));
        driver.route(format!("//m{}", MULTI_CONTAINER), &[layer]);

        let labels: Vec<_> = ["Apple", "Pear"]
            .iter()
            .map(|text| driver.add(MockElement::new("label").text(text)))
            .collect();
        driver.route(format!("//m{}", MULTI_OPTION_LABELS), &labels);

        let rows: Vec<_> = (0..2)
            .map(|_| driver.add(MockElement::new("div").attr("class", "multiSelectItem")))
            .collect();
        for (i, row) in rows.iter().enumerate() {
            driver.route(format!("//m{}[{}]", MULTI_OPTION, i + 1), &[*row]);
        }

        (driver.clone(), MultiSelect::from_element(root(&driver, "//m")), rows)
    }

    #[tokio::test]
    async fn test_multiselect_options_and_index_selection() {
        let (driver, multi, rows) = multiselect_fixture();

        assert_eq!(multi.options().await.unwrap(), vec!["Apple", "Pear"]);
        assert!(multi.selected_options().await.unwrap().is_empty());

        assert!(multi.select_by_index(1).await.unwrap());
        assert_eq!(driver.clicks(), vec![rows[1]]);

        driver.update(rows[1], |e| {
            e.attributes
                .insert("class".to_string(), "multiSelectItem selected".to_string());
        });
        assert!(multi.select_by_index(1).await.unwrap());
        assert_eq!(driver.clicks().len(), 1);

        assert!(multi.deselect_by_index(1).await.unwrap());
        assert_eq!(driver.clicks().len(), 2);
        assert!(!multi.select_by_index(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_multiselect_text_selection_is_idempotent() {
        let (driver, multi, _) = multiselect_fixture();
        let row = driver.add(
            MockElement::new("div").attr("class", "multiSelectItem selected"),
        );
        driver.route(
            r#"//m/descendant-or-self::label[contains(., "Apple")]/ancestor::div[contains(@ng-repeat, "filteredModel")]"#,
            &[row],
        );

        assert!(multi.select_by_text("Apple").await.unwrap());
        assert!(driver.clicks().is_empty());
        assert!(multi.deselect_by_text("Apple").await.unwrap());
        assert_eq!(driver.clicks(), vec![row]);
        assert!(!multi.select_by_text("Plum").await.unwrap());
    }

    #[tokio::test]
    async fn test_multiselect_helpers_expand_first() {
        let (driver, multi, _) = multiselect_fixture();
        let layer = driver.find_elements(&format!("//m{}", MULTI_CONTAINER)).await.unwrap()[0];
        driver.update(layer, |e| e.displayed = false);

        let toggle = driver.add(MockElement::new("button").reveals(layer));
        let all = driver.add(MockElement::new("button"));
        let filter = driver.add(MockElement::new("input"));
        driver.route(format!("//m{}", helper_button("toggle")), &[toggle]);
        driver.route(format!("//m{}", helper_button("all")), &[all]);
        driver.route(
            r#"//m/descendant-or-self::input[contains(@ng-click, "filter")]"#,
            &[filter],
        );

        assert!(multi.select_all().await.unwrap());
        assert_eq!(driver.clicks(), vec![toggle, all]);
        assert!(multi.search("pe", true).await.unwrap());
        assert_eq!(driver.typed(), vec![(filter, "pe".to_string())]);
        assert!(!multi.reset().await.unwrap());
        assert!(multi.collapse().await.unwrap());
        assert_eq!(driver.clicks().len(), 3);
    }

    #[tokio::test]
    async fn test_form_fields_by_name() {
        let driver = Arc::new(MockDriver::new());
        let email = driver.add(MockElement::new("input").attr("type", "text"));
        let country = driver.add(MockElement::new("select"));
        let notes = driver.add(MockElement::new("div"));
        let any = |name: &str| {
            format!(
                r#"//f/descendant-or-self::*[((self::input and @type="text") or self::textarea or self::select) and @name="{}"]"#,
                name
            )
        };
        driver.route(any("email"), &[email]);
        driver.route(any("country"), &[country]);
        driver.route(any("notes"), &[notes]);

        let form = Form::from_element(root(&driver, "//f"));
        match form.get_field("email").await.unwrap() {
            Some(FormField::Input(input)) => assert_eq!(
                input.locator().unwrap().value,
                r#"//f/descendant-or-self::*[((self::input and @type="text") or self::textarea) and @name="email"]"#
            ),
            other => panic!("unexpected field {:?}", other),
        }
        match form.get_field("country").await.unwrap() {
            Some(FormField::Select(select)) => assert_eq!(
                select.locator().unwrap().value,
                r#"//f/descendant-or-self::*[self::select and @name="country"]"#
            ),
            other => panic!("unexpected field {:?}", other),
        }
        assert!(form.get_field("notes").await.unwrap().is_none());
        assert!(form.get_field("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quoted_names_and_labels_stay_valid() {
        let driver = Arc::new(MockDriver::new());
        let field = driver.add(MockElement::new("textarea"));
        driver.route(
            r#"//f/descendant-or-self::*[((self::input and @type="text") or self::textarea or self::select) and @name='a"b']"#,
            &[field],
        );

        let form = Form::from_element(root(&driver, "//f"));
        assert!(matches!(
            form.get_field(r#"a"b"#).await.unwrap(),
            Some(FormField::Input(_))
        ));

        let multi = MultiSelect::from_element(root(&driver, "//m"));
        assert_eq!(
            multi.option_with_text(r#"12" pipe"#).locator().unwrap().value,
            r#"//m/descendant-or-self::label[contains(., '12" pipe')]/ancestor::div[contains(@ng-repeat, "filteredModel")]"#
        );
    }
}

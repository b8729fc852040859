use super::{
    AsElement, Clickable, Element, ElementKind, ElementType, InputAccepting, Selectable,
    SingleChoice, TextBearing,
};
use crate::core::WebDriver;
use crate::errors::Result;
use crate::locator::{quote, Locator};

impl<D: WebDriver> ElementType<D> for Element<D> {
    const KIND: ElementKind = ElementKind::Element;

    fn from_element(element: Element<D>) -> Self {
        element
    }
}

element_type!(Button => Button, [Clickable, TextBearing]);
element_type!(Div => Div, []);
element_type!(Image => Image, []);
element_type!(
    /// `<input type="checkbox">`
    InputCheckbox => InputCheckbox, [Clickable, SingleChoice]
);
element_type!(
    /// `<input type="radio">`
    InputRadio => InputRadio, [Clickable, SingleChoice]
);
element_type!(
    /// Text input or textarea
    InputText => InputText, [Clickable, InputAccepting]
);
element_type!(Link => Link, [Clickable, TextBearing]);
element_type!(
    /// Native `<select>`
    Select => Select, [Selectable]
);
element_type!(
    /// Fallback type for anything without a declared type
    Text => Text, [Clickable, TextBearing]
);

/// Visible text of the `<label for=...>` pointing at the element's id
async fn label_for<D: WebDriver>(element: &Element<D>) -> Result<String> {
    if !element.exists().await? {
        return Ok(String::new());
    }

    let id = element.get_attribute("id").await?;
    if id.is_empty() {
        return Ok(String::new());
    }

    let label = Text::from_element(element.with_locator(&Locator::xpath(format!(
        "/descendant-or-self::label[@for={}]",
        quote(&id)
    ))));
    label.visible_text().await
}

impl<D: WebDriver> Image<D> {
    /// The `src` attribute
    pub async fn source(&self) -> Result<String> {
        self.get_attribute("src").await
    }
}

impl<D: WebDriver> InputCheckbox<D> {
    pub async fn label(&self) -> Result<String> {
        label_for(self.as_element()).await
    }
}

impl<D: WebDriver> InputRadio<D> {
    pub async fn label(&self) -> Result<String> {
        label_for(self.as_element()).await
    }
}

impl<D: WebDriver> InputText<D> {
    pub async fn label(&self) -> Result<String> {
        label_for(self.as_element()).await
    }
}

use super::{
    AsElement, BadgeDropdown, Button, Clickable, Div, Dropdown, Element, Form, Image,
    InputAccepting, InputCheckbox, InputRadio, InputText, Link, MultiSelect, Select, Selectable,
    SingleChoice, Text, TextBearing,
};
use crate::core::WebDriver;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Type name used when an element declares none, or one nobody registered
pub const DEFAULT_TYPE: &str = "text";

/// A typed wrapper constructible from a base element
pub trait ElementType<D: WebDriver>: AsElement<D> + Sized {
    const KIND: ElementKind;

    fn from_element(element: Element<D>) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Element,
    BadgeDropdown,
    Button,
    Div,
    Dropdown,
    Form,
    Image,
    InputCheckbox,
    InputRadio,
    InputText,
    Link,
    MultiSelect,
    Select,
    Text,
}

impl ElementKind {
    pub const ALL: [ElementKind; 14] = [
        ElementKind::Element,
        ElementKind::BadgeDropdown,
        ElementKind::Button,
        ElementKind::Div,
        ElementKind::Dropdown,
        ElementKind::Form,
        ElementKind::Image,
        ElementKind::InputCheckbox,
        ElementKind::InputRadio,
        ElementKind::InputText,
        ElementKind::Link,
        ElementKind::MultiSelect,
        ElementKind::Select,
        ElementKind::Text,
    ];

    /// Registered (lowercase) type name
    pub const fn name(&self) -> &'static str {
        match self {
            ElementKind::Element => "element",
            ElementKind::BadgeDropdown => "badgedropdown",
            ElementKind::Button => "button",
            ElementKind::Div => "div",
            ElementKind::Dropdown => "dropdown",
            ElementKind::Form => "form",
            ElementKind::Image => "image",
            ElementKind::InputCheckbox => "inputcheckbox",
            ElementKind::InputRadio => "inputradio",
            ElementKind::InputText => "inputtext",
            ElementKind::Link => "link",
            ElementKind::MultiSelect => "multiselect",
            ElementKind::Select => "select",
            ElementKind::Text => "text",
        }
    }

    /// Capabilities in member lookup order; the base element always comes first
    pub const fn capabilities(&self) -> &'static [Capability] {
        match self {
            ElementKind::Element | ElementKind::Div => &[Capability::Element],
            ElementKind::BadgeDropdown | ElementKind::Dropdown => &[
                Capability::Element,
                Capability::Clickable,
                Capability::TextBearing,
                Capability::Widget,
            ],
            ElementKind::Button | ElementKind::Link | ElementKind::Text => &[
                Capability::Element,
                Capability::Clickable,
                Capability::TextBearing,
            ],
            ElementKind::Form | ElementKind::Image | ElementKind::MultiSelect => {
                &[Capability::Element, Capability::Widget]
            }
            ElementKind::InputCheckbox | ElementKind::InputRadio => &[
                Capability::Element,
                Capability::Clickable,
                Capability::SingleChoice,
                Capability::Widget,
            ],
            ElementKind::InputText => &[
                Capability::Element,
                Capability::Clickable,
                Capability::InputAccepting,
                Capability::Widget,
            ],
            ElementKind::Select => &[Capability::Element, Capability::Selectable],
        }
    }

    /// Wrap `element` in the typed element this kind names
    pub fn build<D: WebDriver>(self, element: Element<D>) -> TypedElement<D> {
        match self {
            ElementKind::Element => TypedElement::Element(element),
            ElementKind::BadgeDropdown => {
                TypedElement::BadgeDropdown(BadgeDropdown::from_element(element))
            }
            ElementKind::Button => TypedElement::Button(Button::from_element(element)),
            ElementKind::Div => TypedElement::Div(Div::from_element(element)),
            ElementKind::Dropdown => TypedElement::Dropdown(Dropdown::from_element(element)),
            ElementKind::Form => TypedElement::Form(Form::from_element(element)),
            ElementKind::Image => TypedElement::Image(Image::from_element(element)),
            ElementKind::InputCheckbox => {
                TypedElement::InputCheckbox(InputCheckbox::from_element(element))
            }
            ElementKind::InputRadio => TypedElement::InputRadio(InputRadio::from_element(element)),
            ElementKind::InputText => TypedElement::InputText(InputText::from_element(element)),
            ElementKind::Link => TypedElement::Link(Link::from_element(element)),
            ElementKind::MultiSelect => {
                TypedElement::MultiSelect(MultiSelect::from_element(element))
            }
            ElementKind::Select => TypedElement::Select(Select::from_element(element)),
            ElementKind::Text => TypedElement::Text(Text::from_element(element)),
        }
    }
}

/// Group a resolved member belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    Element,
    Clickable,
    TextBearing,
    InputAccepting,
    Selectable,
    SingleChoice,
    /// Operations specific to one widget type
    Widget,
}

impl Capability {
    /// Member names this capability contributes to an element of `kind`
    pub fn members(&self, kind: ElementKind) -> &'static [&'static str] {
        match self {
            Capability::Element => &[
                "angular_scope",
                "blur",
                "css_property",
                "drag",
                "element",
                "exists",
                "focus",
                "get_attribute",
                "has_attribute",
                "is_disabled",
                "is_displayed",
                "outer_html",
                "parent",
                "scroll_to",
                "tag_name",
                "wait_until_appears",
                "wait_until_disappears",
                "wait_until_present",
            ],
            Capability::Clickable => &["click", "hover"],
            Capability::TextBearing => &["text", "visible_text"],
            Capability::InputAccepting => &["input", "value"],
            Capability::Selectable => &[
                "deselect_all",
                "deselect_by_index",
                "deselect_by_text",
                "deselect_by_value",
                "options",
                "select_by_index",
                "select_by_text",
                "select_by_value",
                "selected_first",
                "selected_options",
            ],
            Capability::SingleChoice => &["deselect", "select", "selected"],
            Capability::Widget => match kind {
                ElementKind::Dropdown => &["collapse", "expand"],
                ElementKind::BadgeDropdown => &["collapse", "expand", "hide", "show"],
                ElementKind::MultiSelect => &[
                    "clear_search",
                    "collapse",
                    "deselect_by_index",
                    "deselect_by_text",
                    "expand",
                    "options",
                    "reset",
                    "search",
                    "select_all",
                    "select_by_index",
                    "select_by_text",
                    "select_none",
                    "selected_options",
                ],
                ElementKind::Form => &["get_field"],
                ElementKind::Image => &["source"],
                ElementKind::InputCheckbox | ElementKind::InputRadio | ElementKind::InputText => {
                    &["label"]
                }
                _ => &[],
            },
        }
    }
}

/// Registry of element types by name
pub struct TypeRegistry {
    types: HashMap<String, ElementKind>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry holding every built-in kind
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in ElementKind::ALL {
            registry.register(kind.name(), kind);
        }
        registry
    }

    /// Register a kind under a case-insensitive name
    pub fn register(&mut self, name: &str, kind: ElementKind) {
        self.types.insert(name.to_lowercase(), kind);
    }

    pub fn get(&self, name: &str) -> Option<ElementKind> {
        self.types.get(&name.to_lowercase()).copied()
    }

    /// Kind registered under `name`, falling back to the default type
    pub fn lookup(&self, name: &str) -> ElementKind {
        self.get(name)
            .or_else(|| self.get(DEFAULT_TYPE))
            .unwrap_or(ElementKind::Text)
    }

    /// List all registered type names
    pub fn list_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.types.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Process-wide registry of the built-in kinds
pub fn registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeRegistry::builtin)
}

/// Kind for a declared type name, [`DEFAULT_TYPE`] when unknown
pub fn lookup(name: &str) -> ElementKind {
    registry().lookup(name)
}

/// Any typed element, as bound to an identifier at runtime
pub enum TypedElement<D: WebDriver> {
    Element(Element<D>),
    BadgeDropdown(BadgeDropdown<D>),
    Button(Button<D>),
    Div(Div<D>),
    Dropdown(Dropdown<D>),
    Form(Form<D>),
    Image(Image<D>),
    InputCheckbox(InputCheckbox<D>),
    InputRadio(InputRadio<D>),
    InputText(InputText<D>),
    Link(Link<D>),
    MultiSelect(MultiSelect<D>),
    Select(Select<D>),
    Text(Text<D>),
}

impl<D: WebDriver> TypedElement<D> {
    pub fn kind(&self) -> ElementKind {
        match self {
            TypedElement::Element(_) => ElementKind::Element,
            TypedElement::BadgeDropdown(_) => ElementKind::BadgeDropdown,
            TypedElement::Button(_) => ElementKind::Button,
            TypedElement::Div(_) => ElementKind::Div,
            TypedElement::Dropdown(_) => ElementKind::Dropdown,
            TypedElement::Form(_) => ElementKind::Form,
            TypedElement::Image(_) => ElementKind::Image,
            TypedElement::InputCheckbox(_) => ElementKind::InputCheckbox,
            TypedElement::InputRadio(_) => ElementKind::InputRadio,
            TypedElement::InputText(_) => ElementKind::InputText,
            TypedElement::Link(_) => ElementKind::Link,
            TypedElement::MultiSelect(_) => ElementKind::MultiSelect,
            TypedElement::Select(_) => ElementKind::Select,
            TypedElement::Text(_) => ElementKind::Text,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        self.kind().capabilities()
    }

    /// Capability providing the member `name`, in lookup order
    pub fn member(&self, name: &str) -> Option<Capability> {
        let kind = self.kind();
        kind.capabilities()
            .iter()
            .copied()
            .find(|capability| capability.members(kind).contains(&name))
    }

    pub fn as_clickable(&self) -> Option<&dyn Clickable<D>> {
        match self {
            TypedElement::BadgeDropdown(e) => Some(e),
            TypedElement::Button(e) => Some(e),
            TypedElement::Dropdown(e) => Some(e),
            TypedElement::InputCheckbox(e) => Some(e),
            TypedElement::InputRadio(e) => Some(e),
            TypedElement::InputText(e) => Some(e),
            TypedElement::Link(e) => Some(e),
            TypedElement::Text(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&dyn TextBearing<D>> {
        match self {
            TypedElement::BadgeDropdown(e) => Some(e),
            TypedElement::Button(e) => Some(e),
            TypedElement::Dropdown(e) => Some(e),
            TypedElement::Link(e) => Some(e),
            TypedElement::Text(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_input(&self) -> Option<&dyn InputAccepting<D>> {
        match self {
            TypedElement::InputText(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_selectable(&self) -> Option<&dyn Selectable<D>> {
        match self {
            TypedElement::Select(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_single_choice(&self) -> Option<&dyn SingleChoice<D>> {
        match self {
            TypedElement::InputCheckbox(e) => Some(e),
            TypedElement::InputRadio(e) => Some(e),
            _ => None,
        }
    }
}

impl<D: WebDriver> Clone for TypedElement<D> {
    fn clone(&self) -> Self {
        self.kind().build(self.as_element().clone())
    }
}

impl<D: WebDriver> std::fmt::Debug for TypedElement<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedElement")
            .field("kind", &self.kind())
            .field("element", self.as_element())
            .finish()
    }
}

impl<D: WebDriver> AsElement<D> for TypedElement<D> {
    fn as_element(&self) -> &Element<D> {
        match self {
            TypedElement::Element(e) => e,
            TypedElement::BadgeDropdown(e) => e.as_element(),
            TypedElement::Button(e) => e.as_element(),
            TypedElement::Div(e) => e.as_element(),
            TypedElement::Dropdown(e) => e.as_element(),
            TypedElement::Form(e) => e.as_element(),
            TypedElement::Image(e) => e.as_element(),
            TypedElement::InputCheckbox(e) => e.as_element(),
            TypedElement::InputRadio(e) => e.as_element(),
            TypedElement::InputText(e) => e.as_element(),
            TypedElement::Link(e) => e.as_element(),
            TypedElement::MultiSelect(e) => e.as_element(),
            TypedElement::Select(e) => e.as_element(),
            TypedElement::Text(e) => e.as_element(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::locator::By;
    use crate::testing::{MockDriver, MockElement};
    use std::sync::Arc;

    fn element(driver: &Arc<MockDriver>) -> Element<MockDriver> {
        Element::new(driver.clone(), Arc::new(Config::default()), By::XPath, "//x")
    }

    #[test]
    fn test_lookup_is_case_insensitive_with_text_default() {
        assert_eq!(lookup("Button"), ElementKind::Button);
        assert_eq!(lookup("inputcheckbox"), ElementKind::InputCheckbox);
        assert_eq!(lookup("element"), ElementKind::Element);
        assert_eq!(lookup("carousel"), ElementKind::Text);
        assert_eq!(lookup(""), ElementKind::Text);
    }

    #[test]
    fn test_every_kind_is_registered_under_its_name() {
        let names = registry().list_types();
        assert_eq!(names.len(), ElementKind::ALL.len());
        for kind in ElementKind::ALL {
            assert_eq!(lookup(kind.name()), kind);
        }
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = TypeRegistry::builtin();
        registry.register("Toggle", ElementKind::InputCheckbox);
        assert_eq!(registry.lookup("toggle"), ElementKind::InputCheckbox);
        assert_eq!(TypeRegistry::new().lookup("button"), ElementKind::Text);
    }

    #[test]
    fn test_build_and_capability_views() {
        let driver = Arc::new(MockDriver::new());
        for kind in ElementKind::ALL {
            let typed = kind.build(element(&driver));
            assert_eq!(typed.kind(), kind);
            let has = |capability| kind.capabilities().contains(&capability);
            assert_eq!(typed.as_clickable().is_some(), has(Capability::Clickable));
            assert_eq!(typed.as_text().is_some(), has(Capability::TextBearing));
            assert_eq!(typed.as_input().is_some(), has(Capability::InputAccepting));
            assert_eq!(typed.as_selectable().is_some(), has(Capability::Selectable));
            assert_eq!(typed.as_single_choice().is_some(), has(Capability::SingleChoice));
        }
    }

    #[test]
    fn test_member_lookup() {
        let driver = Arc::new(MockDriver::new());
        let button = ElementKind::Button.build(element(&driver));
        assert_eq!(button.member("click"), Some(Capability::Clickable));
        assert_eq!(button.member("exists"), Some(Capability::Element));
        assert_eq!(button.member("input"), None);

        let multi = ElementKind::MultiSelect.build(element(&driver));
        assert_eq!(multi.member("select_all"), Some(Capability::Widget));
        assert_eq!(multi.member("click"), None);

        let select = ElementKind::Select.build(element(&driver));
        assert_eq!(select.member("options"), Some(Capability::Selectable));
    }

    #[tokio::test]
    async fn test_dynamic_click_through_typed_element() {
        let driver = Arc::new(MockDriver::new());
        let h = driver.add(MockElement::new("a"));
        driver.route("//x", &[h]);

        let link = lookup("link").build(element(&driver));
        let clicked = link.as_clickable().unwrap().click().await.unwrap();
        assert!(clicked);
        assert_eq!(driver.clicks(), vec![h]);
    }
}

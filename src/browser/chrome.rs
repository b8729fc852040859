use crate::core::{poll_until, BrowserConfig, WaitCondition, WebDriver};
use crate::errors::{QaError, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Resolves the `i`-th match of `xp` under `ctx`, or null
const PICK: &str = "const __qaPick = (xp, i, ctx) => ctx ? document.evaluate(xp, ctx, null, \
    XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotItem(i) : null;";

/// A page node addressed by the query that found it.
///
/// Chrome hands out no stable element references through `evaluate`, so a handle replays its
/// query (and its scope's queries) on every use. A handle whose query no longer reaches a node
/// is stale.
#[derive(Debug, Clone)]
pub struct ChromeElement {
    scope: Option<Box<ChromeElement>>,
    xpath: String,
    index: usize,
}

impl ChromeElement {
    fn expression(&self) -> String {
        let context = match &self.scope {
            Some(scope) => scope.expression(),
            None => "document".to_string(),
        };
        format!("__qaPick({}, {}, {})", js_string(&self.xpath), self.index, context)
    }
}

fn js_string(value: &str) -> String {
    Value::from(value).to_string()
}

/// [`WebDriver`] over a single headless Chrome tab
pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
    implicit_wait: Mutex<Duration>,
}

impl ChromeDriver {
    /// Start Chrome and open a tab
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| QaError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| QaError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| QaError::LaunchFailed(e.to_string()))?;

        Ok(Self {
            _browser: browser,
            tab,
            implicit_wait: Mutex::new(Duration::ZERO),
        })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode its result
    fn evaluate_json(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| QaError::JavaScriptFailed(e.to_string()))?;

        match result.value {
            Some(Value::String(raw)) => Ok(serde_json::from_str(&raw)?),
            Some(other) => Ok(other),
            None => Ok(Value::Null),
        }
    }

    /// Run `body` as a function with `this` bound to the element
    fn on_element(&self, element: &ChromeElement, body: &str) -> Result<Value> {
        let script = format!(
            "(function() {{ {} const el = {}; if (!el) {{ return JSON.stringify({{ stale: true }}); }} \
             try {{ const v = (function() {{ {} }}).call(el); \
             return JSON.stringify({{ value: v === undefined ? null : v }}); }} \
             catch (e) {{ return JSON.stringify({{ error: String(e) }}); }} }})()",
            PICK,
            element.expression(),
            body
        );

        let outcome = self.evaluate_json(&script)?;
        if outcome.get("stale").is_some() {
            return Err(QaError::StaleElement(element.xpath.clone()));
        }
        if let Some(error) = outcome.get("error") {
            return Err(QaError::JavaScriptFailed(error.to_string()));
        }
        Ok(outcome.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Number of nodes matching `xpath` under the element expression `context`
    fn count(&self, context: &str, xpath: &str) -> Result<usize> {
        let script = format!(
            "(function() {{ {} const ctx = {}; if (!ctx) {{ return JSON.stringify(-2); }} \
             try {{ return JSON.stringify(document.evaluate({}, ctx, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength); }} \
             catch (e) {{ return JSON.stringify(-1); }} }})()",
            PICK,
            context,
            js_string(xpath)
        );

        match self.evaluate_json(&script)?.as_i64() {
            Some(-1) => Err(QaError::InvalidSelector(xpath.to_string())),
            Some(-2) => Err(QaError::StaleElement(context.to_string())),
            Some(n) if n >= 0 => Ok(n as usize),
            _ => Err(QaError::JavaScriptFailed(format!(
                "unexpected result counting {}",
                xpath
            ))),
        }
    }

    /// Query, retrying until the implicit wait runs out while nothing matches
    async fn query(
        &self,
        scope: Option<&ChromeElement>,
        xpath: &str,
    ) -> Result<Vec<ChromeElement>> {
        let context = scope
            .map(ChromeElement::expression)
            .unwrap_or_else(|| "document".to_string());
        let implicit_wait = *self
            .implicit_wait
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let deadline = Instant::now() + implicit_wait;

        loop {
            let count = self.count(&context, xpath)?;
            if count > 0 || Instant::now() >= deadline {
                debug!("{} matched {} node(s)", xpath, count);
                return Ok((0..count)
                    .map(|index| ChromeElement {
                        scope: scope.map(|s| Box::new(s.clone())),
                        xpath: xpath.to_string(),
                        index,
                    })
                    .collect());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Viewport coordinates of the element's center, scrolled into view first
    fn center(&self, element: &ChromeElement) -> Result<Point> {
        let value = self.on_element(
            element,
            "this.scrollIntoView({ block: 'center', inline: 'center' }); \
             const r = this.getBoundingClientRect(); \
             return { x: r.left + r.width / 2, y: r.top + r.height / 2 };",
        )?;

        match (
            value.get("x").and_then(Value::as_f64),
            value.get("y").and_then(Value::as_f64),
        ) {
            (Some(x), Some(y)) => Ok(Point { x, y }),
            _ => Err(QaError::JavaScriptFailed(format!(
                "no position for {}",
                element.xpath
            ))),
        }
    }

    fn mouse_event(&self, kind: Input::DispatchMouseEventTypeOption, point: Point) -> Result<()> {
        self.tab
            .call_method(Input::DispatchMouseEvent {
                Type: kind,
                x: point.x,
                y: point.y,
                modifiers: None,
                timestamp: None,
                button: Some(Input::MouseButton::Left),
                buttons: Some(1),
                click_count: Some(1),
                force: None,
                tangential_pressure: None,
                tilt_x: None,
                tilt_y: None,
                twist: None,
                delta_x: None,
                delta_y: None,
                pointer_Type: None,
            })
            .map_err(|e| QaError::ElementNotInteractable(e.to_string()))?;
        Ok(())
    }

    fn bool_of(value: Value) -> bool {
        value.as_bool().unwrap_or(false)
    }

    fn string_of(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl WebDriver for ChromeDriver {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| QaError::NavigationFailed(e.to_string()))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| QaError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn find_elements(&self, xpath: &str) -> Result<Vec<Self::Element>> {
        if xpath.is_empty() {
            return Err(QaError::InvalidSelector("empty xpath".to_string()));
        }
        self.query(None, xpath).await
    }

    async fn find_elements_in(
        &self,
        root: &Self::Element,
        xpath: &str,
    ) -> Result<Vec<Self::Element>> {
        self.query(Some(root), xpath).await
    }

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>> {
        match self.on_element(element, &attribute_script(name))? {
            Value::Null => Ok(None),
            value => Ok(Some(Self::string_of(value))),
        }
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        let value = self.on_element(element, "return this.innerText || '';")?;
        Ok(Self::string_of(value))
    }

    async fn tag_name(&self, element: &Self::Element) -> Result<String> {
        let value = self.on_element(element, "return this.tagName.toLowerCase();")?;
        Ok(Self::string_of(value))
    }

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool> {
        let value = self.on_element(
            element,
            "const s = window.getComputedStyle(this); const r = this.getBoundingClientRect(); \
             return s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0;",
        )?;
        Ok(Self::bool_of(value))
    }

    async fn is_selected(&self, element: &Self::Element) -> Result<bool> {
        let value = self.on_element(element, "return !!(this.selected || this.checked);")?;
        Ok(Self::bool_of(value))
    }

    async fn css_value(&self, element: &Self::Element, property: &str) -> Result<String> {
        let body = format!(
            "return window.getComputedStyle(this).getPropertyValue({});",
            js_string(property)
        );
        Ok(Self::string_of(self.on_element(element, &body)?))
    }

    async fn click(&self, element: &Self::Element) -> Result<()> {
        let outcome = self.on_element(
            element,
            "const r = this.getBoundingClientRect(); \
             const hit = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
             if (!hit || !(hit === this || this.contains(hit))) { return 'blocked'; } \
             this.click(); return 'ok';",
        )?;

        if outcome.as_str() == Some("blocked") {
            return Err(QaError::ElementNotInteractable(element.xpath.clone()));
        }
        Ok(())
    }

    async fn clear(&self, element: &Self::Element) -> Result<()> {
        self.on_element(
            element,
            "this.value = ''; \
             this.dispatchEvent(new Event('input', { bubbles: true })); \
             this.dispatchEvent(new Event('change', { bubbles: true }));",
        )?;
        Ok(())
    }

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<()> {
        self.on_element(element, "this.focus();")?;
        self.tab
            .type_str(text)
            .map_err(|e| QaError::ElementNotInteractable(e.to_string()))?;
        Ok(())
    }

    async fn hover(&self, element: &Self::Element) -> Result<()> {
        let point = self.center(element)?;
        self.tab
            .move_mouse_to_point(point)
            .map_err(|e| QaError::ElementNotInteractable(e.to_string()))?;
        Ok(())
    }

    async fn drag_by(&self, element: &Self::Element, x_offset: i64, y_offset: i64) -> Result<()> {
        let start = self.center(element)?;
        self.tab
            .move_mouse_to_point(start)
            .map_err(|e| QaError::ElementNotInteractable(e.to_string()))?;

        for (kind, point) in drag_path(start, x_offset, y_offset) {
            self.mouse_event(kind, point)?;
        }
        Ok(())
    }

    async fn call_function(&self, element: &Self::Element, function: &str) -> Result<Value> {
        self.on_element(element, &format!("return ({}).call(this);", function))
    }

    async fn set_selected(&self, option: &Self::Element, selected: bool) -> Result<()> {
        self.on_element(option, &select_option_script(selected))?;
        Ok(())
    }

    async fn set_implicit_wait(&self, timeout: Duration) -> Result<()> {
        *self
            .implicit_wait
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = timeout;
        Ok(())
    }

    /// Presence uses Chrome's own XPath wait; visibility has no native wait and is polled
    async fn wait_until(
        &self,
        condition: WaitCondition,
        xpath: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool> {
        if !has_native_wait(condition) {
            return poll_until(self, condition, xpath, timeout, poll_interval).await;
        }

        match self.tab.wait_for_xpath_with_custom_timeout(xpath, timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("{} not present after {:?}: {}", xpath, timeout, e);
                Ok(false)
            }
        }
    }
}

fn has_native_wait(condition: WaitCondition) -> bool {
    condition == WaitCondition::Presence
}

/// Press at `start`, move by the offset with the button held, release there
fn drag_path(
    start: Point,
    x_offset: i64,
    y_offset: i64,
) -> [(Input::DispatchMouseEventTypeOption, Point); 3] {
    let end = Point {
        x: start.x + x_offset as f64,
        y: start.y + y_offset as f64,
    };
    [
        (Input::DispatchMouseEventTypeOption::MousePressed, start),
        (Input::DispatchMouseEventTypeOption::MouseMoved, end),
        (Input::DispatchMouseEventTypeOption::MouseReleased, end),
    ]
}

/// Property first, then attribute; `class` and `style` only ever read the attribute
fn attribute_script(name: &str) -> String {
    format!(
        "const n = {}; \
         if (n === 'class' || n === 'style') {{ return this.getAttribute(n); }} \
         const p = this[n]; \
         if (typeof p === 'boolean') {{ return p ? 'true' : null; }} \
         if (p !== undefined && p !== null && typeof p !== 'object' && typeof p !== 'function') {{ return String(p); }} \
         return this.getAttribute(n);",
        js_string(name)
    )
}

fn select_option_script(selected: bool) -> String {
    format!(
        "this.selected = {}; \
         const s = this.closest('select'); \
         if (s) {{ \
         s.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         s.dispatchEvent(new Event('change', {{ bubbles: true }})); }}",
        selected
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_expression_nests_scopes() {
        let root = ChromeElement {
            scope: None,
            xpath: "//select".to_string(),
            index: 0,
        };
        let option = ChromeElement {
            scope: Some(Box::new(root)),
            xpath: ".//option".to_string(),
            index: 2,
        };

        assert_eq!(
            option.expression(),
            r#"__qaPick(".//option", 2, __qaPick("//select", 0, document))"#
        );
    }

    #[test]
    fn test_attribute_reads_live_property_before_markup() {
        let script = attribute_script("value");
        let property = script.find("const p = this[n]").unwrap();
        let fallback = script.rfind("return this.getAttribute(n)").unwrap();

        assert!(script.starts_with(r#"const n = "value";"#));
        assert!(property < fallback);
        assert!(script.contains("n === 'class' || n === 'style'"));
    }

    #[test]
    fn test_option_selection_sets_state_without_clicking() {
        let script = select_option_script(true);

        assert!(script.starts_with("this.selected = true;"));
        assert!(script.contains("new Event('change'"));
        assert!(!script.contains("elementFromPoint"));
        assert!(!script.contains("click()"));
        assert!(select_option_script(false).starts_with("this.selected = false;"));
    }

    #[test]
    fn test_only_presence_uses_native_wait() {
        assert!(has_native_wait(WaitCondition::Presence));
        assert!(!has_native_wait(WaitCondition::Visibility));
        assert!(!has_native_wait(WaitCondition::Invisibility));
    }

    #[test]
    fn test_drag_presses_moves_then_releases() {
        let path = drag_path(Point { x: 10.0, y: 20.0 }, 5, -4);

        assert!(matches!(
            path[0],
            (Input::DispatchMouseEventTypeOption::MousePressed, Point { x, y }) if x == 10.0 && y == 20.0
        ));
        assert!(matches!(
            path[1],
            (Input::DispatchMouseEventTypeOption::MouseMoved, Point { x, y }) if x == 15.0 && y == 16.0
        ));
        assert!(matches!(
            path[2],
            (Input::DispatchMouseEventTypeOption::MouseReleased, Point { x, y }) if x == 15.0 && y == 16.0
        ));
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"//a[@id="x"]"#), r#""//a[@id=\"x\"]""#);
    }
}

use crate::core::{Config, WaitCondition, WebDriver};
use crate::errors::{QaError, Result};
use crate::locator::quote;
use crate::node::Node;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Entry point: a driver, the site it is pointed at and the identifier tree of the current page
pub struct App<D: WebDriver> {
    driver: Arc<D>,
    config: Arc<Config>,
    scheme: String,
    hostname: String,
    page: Node<D>,
}

/// Scheme and authority of `url`, empty when it names no host.
///
/// The authority is kept as written: credentials, letter case and a default port survive.
fn split_url(url: &str) -> (String, String) {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => match url.strip_prefix("//") {
            Some(rest) => (String::new(), rest),
            None => return (String::new(), String::new()),
        },
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();

    let base = if scheme.is_empty() { "http" } else { scheme.as_str() };
    match Url::parse(&format!("{}://{}", base, authority)) {
        Ok(parsed) if parsed.has_host() && !authority.is_empty() => (scheme, authority.to_string()),
        _ => (String::new(), String::new()),
    }
}

/// Path component of `path`, always with a leading '/'
fn path_component(path: &str) -> String {
    let raw = match Url::parse(path) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => path.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    if raw.starts_with('/') {
        raw
    } else {
        format!("/{}", raw)
    }
}

impl<D: WebDriver> App<D> {
    /// Create an app with the default configuration.
    ///
    /// When `url` names a host the driver is sent to `scheme://host` straight away.
    pub async fn new(driver: Arc<D>, url: Option<&str>) -> Result<Self> {
        Self::with_config(driver, Config::default(), url).await
    }

    pub async fn with_config(driver: Arc<D>, config: Config, url: Option<&str>) -> Result<Self> {
        let config = Arc::new(config);
        let (scheme, hostname) = split_url(url.unwrap_or_default());

        let app = Self {
            page: Node::root(driver.clone(), config.clone()),
            driver,
            config,
            scheme: if scheme.is_empty() {
                "http".to_string()
            } else {
                scheme
            },
            hostname,
        };

        if !app.hostname.is_empty() {
            app.get(&format!("{}://{}", app.scheme, app.hostname)).await?;
        }

        Ok(app)
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host the app navigates under, empty when unset
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn page(&self) -> &Node<D> {
        &self.page
    }

    /// Navigate to an absolute URL
    pub async fn get(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.driver.navigate(url).await
    }

    /// Navigate to `path` under the app's host
    pub async fn navigate_to(&self, path: &str) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(QaError::HostnameNotSet);
        }
        let url = format!("{}://{}{}", self.scheme, self.hostname, path_component(path));
        self.get(&url).await
    }

    /// Rebuild [`page`](Self::page) from the identifiers on the current page.
    ///
    /// Identifiers carried by more than one element are logged and returned; the tree still gets
    /// a single node for each.
    pub async fn update(&mut self, name_attr: &str, type_attr: &str) -> Result<Vec<String>> {
        let scan = format!("/descendant-or-self::*[@{}]", name_attr);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for element in self.driver.find_elements(&scan).await? {
            if let Some(identifier) = self.driver.attribute(&element, name_attr).await? {
                *counts.entry(identifier).or_default() += 1;
            }
        }

        let duplicates: Vec<String> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(identifier, _)| identifier.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !duplicates.is_empty() {
            warn!(
                "UniquenessWarning: There appears to be multiple elements with the same identifier. \
                 Please review the following element(s): {}",
                duplicates.join(", ")
            );
        }

        let config = Arc::new(Config::clone(&self.config).with_naming(name_attr, type_attr));
        let identifiers: BTreeSet<String> = counts.into_keys().collect();
        let mut page = Node::root(self.driver.clone(), config.clone());
        page.add_children(&identifiers)?;

        info!("Scanned {} identifiers", identifiers.len());
        self.config = config;
        self.page = page;
        Ok(duplicates)
    }

    /// [`update`](Self::update) with the configured attribute names
    pub async fn rescan(&mut self) -> Result<Vec<String>> {
        let naming = self.config.naming.clone();
        self.update(&naming.name_attr, &naming.type_attr).await
    }

    /// Wait until an element whose identifier contains `identifier` is in the DOM
    pub async fn wait_until_present(&self, identifier: &str, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Presence, identifier, timeout)
            .await
    }

    pub async fn wait_until_appears(&self, identifier: &str, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Visibility, identifier, timeout)
            .await
    }

    pub async fn wait_until_disappears(&self, identifier: &str, timeout: Duration) -> Result<bool> {
        self.wait_until(WaitCondition::Invisibility, identifier, timeout)
            .await
    }

    async fn wait_until(
        &self,
        condition: WaitCondition,
        identifier: &str,
        timeout: Duration,
    ) -> Result<bool> {
        let xpath = format!(
            "/descendant-or-self::*[contains(@{}, {})]",
            self.config.naming.name_attr,
            quote(identifier)
        );
        debug!("Waiting for {:?} of {}", condition, xpath);
        self.driver
            .wait_until(condition, &xpath, timeout, self.config.wait.poll_interval())
            .await
    }

    /// Set the driver's implicit wait for element lookups
    pub async fn wait_implicitly(&self, timeout: Duration) -> Result<()> {
        self.driver.set_implicit_wait(timeout).await
    }
}

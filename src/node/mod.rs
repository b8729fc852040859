//! Identifier tree.
//!
//! Every element tagged with a dotted identifier (`user.name`) becomes a path through the tree:
//! `user` is a child of the root and `name` a child of `user`. A non-root node is bound to the
//! page element carrying its full identifier.

pub mod naming;

use crate::core::{Config, WebDriver};
use crate::element::{lookup, Capability, Element, ElementType, TypedElement, DEFAULT_TYPE};
use crate::errors::{QaError, Result};
use crate::locator::{quote, Locator};
use naming::{force_legal_variable_name, RESERVED};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// XPath of the element carrying `identifier` in its `name_attr` attribute
pub fn identifier_xpath(name_attr: &str, identifier: &str) -> String {
    format!("/descendant-or-self::*[@{}={}]", name_attr, quote(identifier))
}

/// Outcome of looking a name up on a node
#[derive(Debug)]
pub enum Resolution<'a, D: WebDriver> {
    /// A child segment, or the legal alias of one
    Child(&'a Node<D>),
    /// A member of the element the node is bound to
    Member {
        element: TypedElement<D>,
        capability: Capability,
    },
    NotFound(String),
}

pub struct Node<D: WebDriver> {
    driver: Arc<D>,
    config: Arc<Config>,
    identifier: String,
    children: BTreeMap<String, Node<D>>,
    aliases: HashMap<String, String>,
}

impl<D: WebDriver> std::fmt::Debug for Node<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.identifier)
            .field("children", &self.children)
            .finish()
    }
}

impl<D: WebDriver> Node<D> {
    pub const DELIMITER: char = '.';

    /// Empty root node
    pub fn root(driver: Arc<D>, config: Arc<Config>) -> Self {
        Self {
            driver,
            config,
            identifier: String::new(),
            children: BTreeMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Build the node for the first segment of `identifier` under `root`.
    ///
    /// Remaining segments become a chain of descendants.
    pub fn new(driver: Arc<D>, config: Arc<Config>, identifier: &str, root: &str) -> Result<Self> {
        let (head, rest) = match identifier.split_once(Self::DELIMITER) {
            Some((head, rest)) => (head, Some(rest)),
            None => (identifier, None),
        };

        let full = match (head.is_empty(), root.is_empty()) {
            (true, _) => String::new(),
            (false, true) => head.to_string(),
            (false, false) => format!("{}{}{}", root, Self::DELIMITER, head),
        };

        let mut node = Self::root(driver, config);
        node.identifier = full;

        if let Some(rest) = rest {
            let segment = rest.split(Self::DELIMITER).next().unwrap_or_default();
            if !segment.is_empty() {
                let child = Node::new(
                    node.driver.clone(),
                    node.config.clone(),
                    rest,
                    &node.identifier,
                )?;
                node.insert(segment, child)?;
            }
        }

        Ok(node)
    }

    fn insert(&mut self, segment: &str, child: Node<D>) -> Result<()> {
        if RESERVED.contains(&segment) {
            return Err(QaError::ReservedName(child.identifier));
        }

        let alias = force_legal_variable_name(segment);
        if alias != segment {
            self.aliases.insert(alias, segment.to_string());
        }
        self.children.insert(segment.to_string(), child);
        Ok(())
    }

    /// Add the dotted `path` below this node; existing segments are reused
    pub fn add_child(&mut self, path: &str) -> Result<()> {
        let (head, rest) = match path.split_once(Self::DELIMITER) {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        if head.is_empty() {
            return Ok(());
        }

        if let Some(existing) = self.children.get_mut(head) {
            if let Some(rest) = rest {
                existing.add_child(rest)?;
            }
            return Ok(());
        }

        let child = Node::new(
            self.driver.clone(),
            self.config.clone(),
            path,
            &self.identifier,
        )?;
        self.insert(head, child)
    }

    pub fn add_children<I, S>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.add_child(path.as_ref())?;
        }
        Ok(())
    }

    /// Full dotted identifier, empty for the root
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_root(&self) -> bool {
        self.identifier.is_empty()
    }

    /// Child segments in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Child by segment or by its legal alias
    pub fn child(&self, name: &str) -> Option<&Node<D>> {
        self.children.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|segment| self.children.get(segment))
        })
    }

    pub fn get(&self, name: &str) -> Result<&Node<D>> {
        self.child(name)
            .ok_or_else(|| QaError::UnknownMember(name.to_string()))
    }

    /// Descend through a dotted path
    pub fn path(&self, dotted: &str) -> Result<&Node<D>> {
        dotted
            .split(Self::DELIMITER)
            .try_fold(self, |node, segment| node.get(segment))
    }

    /// Selector for the bound element, empty for the root
    pub fn xpath(&self) -> String {
        if self.is_root() {
            return String::new();
        }
        identifier_xpath(&self.config.naming.name_attr, &self.identifier)
    }

    /// Declared type of the bound element, lowercased; [`DEFAULT_TYPE`] when undeclared
    pub async fn node_type(&self) -> Result<String> {
        if self.is_root() {
            return Ok(DEFAULT_TYPE.to_string());
        }

        let found = match self.driver.find_elements(&self.xpath()).await {
            Ok(found) => found,
            Err(QaError::InvalidSelector(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let declared = match found.first() {
            Some(element) => {
                self.driver
                    .attribute(element, &self.config.naming.type_attr)
                    .await?
            }
            None => None,
        };

        Ok(match declared {
            Some(declared) if !declared.is_empty() => declared.to_lowercase(),
            _ => DEFAULT_TYPE.to_string(),
        })
    }

    fn element(&self) -> Element<D> {
        Element::from_locator(
            self.driver.clone(),
            self.config.clone(),
            &Locator::xpath(self.xpath()),
        )
    }

    /// The bound element, typed by its declared model. `None` for the root.
    pub async fn this(&self) -> Result<Option<TypedElement<D>>> {
        if self.is_root() {
            return Ok(None);
        }
        let kind = lookup(&self.node_type().await?);
        Ok(Some(kind.build(self.element())))
    }

    /// The bound element viewed as `T`, whatever its declared model
    pub fn bind<T: ElementType<D>>(&self) -> T {
        T::from_element(self.element())
    }

    /// Look `name` up as a child first, then as a member of the bound element
    pub async fn resolve(&self, name: &str) -> Result<Resolution<'_, D>> {
        if let Some(child) = self.child(name) {
            return Ok(Resolution::Child(child));
        }

        let element = match self.this().await? {
            Some(element) => element,
            None => return Ok(Resolution::NotFound(name.to_string())),
        };

        match element.member(name) {
            Some(capability) => {
                debug!(
                    "{} resolved to {:?} member of {}",
                    name, capability, self.identifier
                );
                Ok(Resolution::Member {
                    element,
                    capability,
                })
            }
            None => Ok(Resolution::NotFound(name.to_string())),
        }
    }

    /// `{nodeName, nodeType, <child>: ...}`; the root only lists its children
    pub fn json(&self) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        Box::pin(async move {
            let mut json = Map::new();
            if !self.is_root() {
                json.insert("nodeName".to_string(), Value::from(self.identifier.clone()));
                json.insert("nodeType".to_string(), Value::from(self.node_type().await?));
            }
            for (segment, child) in &self.children {
                json.insert(segment.clone(), child.json().await?);
            }
            Ok(Value::Object(json))
        })
    }

    pub async fn wait_until_present(&self, timeout: Duration) -> Result<bool> {
        self.element().wait_until_present(timeout).await
    }

    pub async fn wait_until_appears(&self, timeout: Duration) -> Result<bool> {
        self.element().wait_until_appears(timeout).await
    }

    pub async fn wait_until_disappears(&self, timeout: Duration) -> Result<bool> {
        self.element().wait_until_disappears(timeout).await
    }
}

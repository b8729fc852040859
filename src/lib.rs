pub mod app;
#[cfg(feature = "chrome")]
pub mod browser;
pub mod core;
pub mod element;
pub mod errors;
pub mod locator;
pub mod node;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use app::App;
#[cfg(feature = "chrome")]
pub use browser::ChromeDriver;
pub use crate::core::{Config, WaitCondition, WebDriver};
pub use element::{Element, ElementKind, TypedElement};
pub use errors::{QaError, Result};
pub use locator::{join, normalize, quote, By, Locator};
pub use node::naming::{force_legal_variable_name, is_legal_variable_name};
pub use node::{Node, Resolution};

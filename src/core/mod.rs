pub mod config;
pub mod driver;

pub use config::{BrowserConfig, Config, NamingConfig, Viewport, WaitConfig};
pub use driver::{poll_until, WaitCondition, WebDriver};

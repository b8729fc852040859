pub mod chrome;

pub use chrome::{ChromeDriver, ChromeElement};

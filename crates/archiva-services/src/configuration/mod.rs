pub mod locator;

pub use locator::{ConfigurationLocator, LocatorSnapshot};

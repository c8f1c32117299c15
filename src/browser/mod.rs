pub mod chromium;
pub mod driver;
pub mod mock;
pub mod types;

pub use chromium::{ChromiumConfig, ChromiumLauncher, ChromiumPage};
pub use driver::{Launcher, PageDriver, bounded, navigate, release};
pub use mock::{ClickEffect, MockElement, MockLauncher, MockPage, MockPageSpec, MockSite, SessionStats};
pub use types::{DriverError, DriverResult, OptionChoice};

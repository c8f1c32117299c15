pub mod classify;
pub mod selector;
pub mod types;

pub use classify::{ActionClassifier, RealisticValues, RULES, Rule, SampleValues, ValueStrategy, strategy_by_name};
pub use selector::derive_selector;
pub use types::{ActionDescriptor, ActionKind, CHECKED, ElementSnapshot, FIRST_OPTION};

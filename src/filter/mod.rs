pub mod actions;
pub mod pattern;
pub mod rule;

pub use actions::{apply_filters, FilterOutcome, FilterUiHooks};
pub use pattern::{Pattern, PatternFlags};
pub use rule::{Filter, FilterMode, FilterTrigger, HeaderSource, RawHeader, Rule, StatusTest};

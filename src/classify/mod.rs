//! Evidence classification.
//!
//! Turns an evidence bundle into either an identified project or a
//! documented unknown reason, using an ordered rule table supplied at
//! construction.

pub mod classifier;
pub mod rules;

pub use classifier::Classifier;
pub use rules::{DescriptorRule, RuleTable, SymbolMatch, TokenRule};

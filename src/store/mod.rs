pub mod rules;

pub use rules::{add_batch, delete_batch, toggle_batch, RuleStore};

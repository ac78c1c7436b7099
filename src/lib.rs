pub mod api;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod observability;
pub mod service;
pub mod store;

pub use config::Config;
pub use dispatch::{EnforcementCommand, PolicyDispatcher};
pub use domain::{Rule, RuleKind, RuleMode};
pub use service::{Reconciler, RuleService};
pub use store::RuleStore;

pub mod rules;
pub mod sync;

pub use rules::{plan_dispatch, RuleService, ServiceError, ToggleSection};
pub use sync::Reconciler;

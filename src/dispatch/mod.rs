pub mod client;
pub mod command;
pub mod mock;
pub mod traits;

pub use client::{DispatchError, PolicyDispatcher};
pub use command::EnforcementCommand;
pub use mock::MockDispatcher;
pub use traits::Dispatch;

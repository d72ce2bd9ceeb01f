pub mod storage;
pub mod types;

pub use storage::AgentStorage;
pub use types::{Agent, AgentCreateInput, AgentUpdateInput, AgentWithKey};

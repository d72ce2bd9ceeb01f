// ABOUTME: Agent authentication for Ben OS
// ABOUTME: API key issuing and verification, agent storage, and capability checks

pub mod agents;
pub mod capabilities;
pub mod keys;

// Re-export main types for convenience
pub use agents::{Agent, AgentCreateInput, AgentStorage, AgentUpdateInput, AgentWithKey};
pub use capabilities::{Access, Capability, Requirement, Resource};
pub use keys::{generate_key, hash_key, verify_key_hash, KEY_PREFIX};

pub mod agents;
pub mod errors;
pub mod guard;
pub mod hook;
pub mod orchestrator;
pub mod patterns;
pub mod profile;
pub mod state;
pub mod supervisor;

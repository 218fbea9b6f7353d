pub mod agents;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod events;
pub mod generation;
pub mod inference;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod service;
pub mod session;
pub mod store;
pub mod testing;

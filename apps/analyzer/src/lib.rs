pub mod analysis;
pub mod client;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod platform;
pub mod routes;
pub mod state;

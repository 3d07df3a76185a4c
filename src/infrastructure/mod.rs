pub mod config;
pub mod error;
pub mod hia_client;
pub mod relay_client;
pub mod secondary_webhook;
pub mod state_store;
pub mod storage;

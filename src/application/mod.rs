pub mod bootstrap;
pub mod commands;
pub mod forms;
pub mod relay;
pub mod relay_server;
pub mod session_actions;
pub mod session_store;
pub mod session_sync;

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod gateway;
pub mod logging;
pub mod mcp_server;
pub mod prompt;
pub mod store;
pub mod studio;
pub mod tools;

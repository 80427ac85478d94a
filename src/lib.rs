pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod emotion;
pub mod history;
pub mod llm;
pub mod profile;
pub mod resources;
pub mod responder;
pub mod session;
pub mod speech;
pub mod store;

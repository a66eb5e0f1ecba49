pub mod catalog;
pub mod coaching;
pub mod collaborator;
pub mod config;
pub mod content;
pub mod domain;
pub mod flow;
pub mod http_client;
pub mod llm_client;
pub mod runtime;
pub mod session;

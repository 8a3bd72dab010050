pub mod config;
pub mod endpoint;
pub mod meta;
pub mod node;
pub mod selector;
pub mod service;
pub mod validate;

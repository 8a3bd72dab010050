pub mod client;
pub mod error;
pub mod registry;
pub mod remote;

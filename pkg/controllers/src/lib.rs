//! Keeps Endpoints objects in sync with the nodes matching each managed
//! Service's node selector.

pub mod builder;
pub mod endpoints_sync;
pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod source;

#[cfg(test)]
mod testing;

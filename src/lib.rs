//! Node provisioning: template resolution, identity creation and key
//! registration, driven by [`pipeline::Pipeline`].
//!
//! The binary entry point is src/main.rs.

pub mod centrifuge;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod document;
pub mod error;
pub mod identity;
pub mod keys;
pub mod logger;
pub mod pipeline;
pub mod store;
pub mod template;

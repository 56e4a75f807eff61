pub mod app;
pub mod blob;
pub mod config;
pub mod domain;
pub mod error;
pub mod manifest;
pub mod output;
pub mod reconcile;
pub mod registry;
pub mod store;
pub mod topics;

pub mod autocomplete;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod models;
pub mod query;
pub mod scatter;
pub mod store;
pub mod ui;

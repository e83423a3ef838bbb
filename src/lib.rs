pub mod cache;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod temp;

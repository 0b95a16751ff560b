pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod screening;

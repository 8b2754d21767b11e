pub mod api;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod fare;
pub mod geo;
pub mod models;
pub mod observability;
pub mod state;

pub mod config;
pub mod controller;
pub mod dom;
pub mod enrich;
pub mod geometry;
pub mod input;
pub mod markers;
pub mod models;
pub mod placement;
pub mod popup;
pub mod query;
pub mod render;
pub mod server;
pub mod sources;
pub mod transport;

pub use config::AppConfig;
pub use server::run_server;

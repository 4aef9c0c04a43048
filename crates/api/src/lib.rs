pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod game;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use state::{AppState, Collaborators};

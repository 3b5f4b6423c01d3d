pub mod app;
pub mod cli;
pub mod config;
pub mod editor;
pub mod events;
pub mod index;
pub mod repository;
pub mod scheduler;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};

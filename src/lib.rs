pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod media;
pub mod platform;
pub mod render;
pub mod store;
pub mod tasks {
    pub mod loader;
}

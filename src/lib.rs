pub mod app;
pub mod capability;
pub mod capture;
pub mod clock;
pub mod color;
pub mod config;
pub mod logging;
pub mod render;
pub mod settings;
pub mod signal;
pub mod surface;
pub mod terminal;
pub mod visual;

pub mod config;
pub mod country;
pub mod output;
pub mod refresh;
pub mod render;
pub mod server;
pub mod store;
pub mod upstream;

pub mod connections;
pub mod rooms;
pub mod services;
pub mod settings;

pub mod alert;
pub mod cache;
pub mod chat;
pub mod config;
pub mod controller;
pub mod dev_mode;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod remote;
pub mod scheduler;
pub mod server;
pub mod verify;

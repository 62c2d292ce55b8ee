//! Chat platform adapter: a thin layer between Discord and the controller.

pub mod command;
pub mod discord;
pub mod handler;
pub mod interactions;
pub mod render;

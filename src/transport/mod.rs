//! Client-facing transport: wire messages and the axum server

pub mod messages;
pub mod server;

pub use messages::{ClientMessage, ServerMessage};
pub use server::{handle_frame, router, serve};

pub mod builtin_models;
pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod params;
pub mod session;
pub mod transport;

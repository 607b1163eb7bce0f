//! bedrock-chat is a terminal chat client for Claude models hosted on Amazon
//! Bedrock.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation store, generation parameters, the
//!   streaming completion client and its transports, and the chat session
//!   that assembles turns from streamed fragments.
//! - [`api`] defines the Anthropic messages request body and the streamed
//!   event payloads exchanged with Bedrock.
//! - [`cli`] parses arguments and runs the interactive chat, the one-shot
//!   `say` command, and the config and model listing commands.
//! - [`utils`] holds the transcript log and image attachment helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;

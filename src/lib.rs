//! Chat bot that relays prompts to hosted language models.
//!
//! Messages are classified by [`dispatch::dispatch`], which reads and updates
//! the persona store and model selection held in [`context::BotContext`] and
//! forwards `/ai` prompts to the provider registered for the current model.

pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod llm;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod persona;
pub mod telegram;

pub use context::BotContext;
pub use dispatch::{Reply, dispatch};

//! API handlers module

pub mod auth;
pub mod chat;
pub mod collections;
pub mod documents;
pub mod health;
pub mod llm;
pub mod settings;

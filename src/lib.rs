//! Teller - conversational banking agent
//!
//! A chat model answers banking questions by calling locally registered
//! functions mid-conversation. Function results are fed back to the model
//! before it produces a final answer.

pub mod config;
pub mod console;
pub mod conversation;
pub mod db;
pub mod functions;
pub mod ledger;
pub mod llm;
pub mod runtime;
pub mod schema;
pub mod state_machine;

//! Blog outline: context-driven outline drafting with a human review loop.

pub mod config;
pub mod context;
pub mod error;
pub mod keywords;
pub mod llm;
pub mod pipeline;
pub mod review;
pub mod store;

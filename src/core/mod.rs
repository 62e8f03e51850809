pub mod channels;
pub mod codegen;
pub mod config;
pub mod generation;
pub mod lifecycle;
pub mod llm;
pub mod ratelimit;
pub mod store;
pub mod terminal;
pub mod validation;
pub mod vault;

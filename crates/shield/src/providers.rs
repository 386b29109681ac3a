pub mod base;
pub mod configs;
pub mod factory;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod utils;

// Library interface for postscope modules
// This allows tests and the binaries to import modules

pub mod extract;
pub mod fetch;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod prompt;
pub mod server;

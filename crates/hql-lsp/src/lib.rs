//! Language server for HQL over stdio.
//!
//! The wire layer (`server`) reads Content-Length framed JSON-RPC from a
//! reader thread feeding a channel; the main loop's receive timeout is
//! the per-document debounce tick, so rapid edits coalesce into one
//! analysis before diagnostics publish. The handler layer
//! (`handler::LspHandler`) owns the open documents, the compiler
//! session, and the project index, and maps each LSP method onto the
//! core's analysis and symbol infrastructure.

pub mod handler;
pub mod server;

pub use server::serve_stdio;

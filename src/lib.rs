//! Persona Relay: persona narratives for customers and students.
//!
//! Turns a structured profile into a deterministic summary, wraps it in a
//! persona prompt, and forwards the prompt to a hosted completion provider.
//! Streaming requests are relayed token-by-token to the browser over SSE.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub mod analysis;
pub mod profile;
pub mod prompt;
pub mod summary;

pub mod generation;
pub mod providers;
pub mod relay;
pub mod telemetry;
pub mod transport;

pub mod server;

//! Model provider implementations for actloop.
//!
//! All providers implement the `actloop_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

//! LLM Provider implementations for Wayfarer.
//!
//! All providers implement the `wayfarer_core::Provider` trait.
//! [`build_from_config`] assembles the configured fallback chain.

pub mod factory;
pub mod fallback;
pub mod openai_compat;

pub use factory::build_from_config;
pub use fallback::FallbackProvider;
pub use openai_compat::OpenAiCompatProvider;

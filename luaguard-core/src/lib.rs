//! LuaGuard Core Library
//!
//! This crate provides the local source-to-source obfuscation pipeline for
//! Lua 5.1 and Luau scripts:
//! - Scanner splitting source into code, string and comment spans
//! - Comment, whitespace and debug-line stripping
//! - String table extraction with per-entry XOR encryption
//! - Scope-aware identifier renaming
//! - Opaque-predicate control-flow obfuscation
//! - Dead-code injection
//! - Preset composition and the output wrapper

pub mod config;
pub mod control_flow;
pub mod dead_code;
pub mod error;
pub mod lexer;
pub mod names;
pub mod pass;
pub mod pipeline;
pub mod preset;
pub mod renamer;
pub mod request;
pub mod scanner;
pub mod seed;
pub mod statement;
pub mod string_table;
pub mod strip;
pub mod wrapper;

// Re-export commonly used types
pub use config::{PipelineConfig, SeedMode};
pub use error::{ObfuscateError, Result};
pub use pipeline::Pipeline;
pub use preset::{PassPlan, Preset};
pub use renamer::RenameStrength;
pub use request::{LanguageVariant, ObfuscationRequest, ObfuscationResult, PassStats, ResultMetadata};
pub use scanner::{render, scan, Span, SpanKind};
pub use seed::Seed;

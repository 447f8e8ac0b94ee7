//! sigil-compiler
//!
//! This crate implements:
//!  1) A tokenizer for preprocessed schema text (with linemarker tracking),
//!  2) A parser that builds an ordered, name-resolved type registry,
//!  3) A dynamic [`Value`](value::Value) encoder/decoder for the wire format,
//!  4) A driver that runs the C preprocessor and compiles files end to end,
//!  5) Error types (`SchemaError`).

pub mod compiler;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod types;
pub mod utils;
pub mod value;

pub use compiler::{compile_file, compile_str, preprocess, DEFAULT_PREPROCESS_TIMEOUT};
pub use error::SchemaError;
pub use types::{DefId, DefKind, Definition, Registry};
pub use value::{decode, encode, Value};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lexical or structural error in the schema text. Rendered as the
    /// single diagnostic string `<file>:<line>:<column>: <message>.` that the
    /// whole front end reports through; parsing halts at the first one.
    #[error("{file}:{line}:{column}: {msg}.")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        msg: String,
    },

    /// The external macro preprocessor could not be run, exited with a
    /// failure status, or did not finish within the allotted time. Carries
    /// the underlying operating-system error text where there is one.
    #[error("preprocessor failed: {0}")]
    Preprocess(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl SchemaError {
    /// Build a located syntax error. `msg` should not carry a trailing
    /// period; the display format adds one.
    pub fn syntax(file: &str, line: usize, column: usize, msg: impl Into<String>) -> SchemaError {
        SchemaError::Syntax {
            file: file.to_string(),
            line,
            column,
            msg: msg.into(),
        }
    }
}

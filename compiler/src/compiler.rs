use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::SchemaError;
use crate::parser::parse;
use crate::tokenizer::tokenize;
use crate::types::Registry;

/// How long the external preprocessor may run before it is killed.
pub const DEFAULT_PREPROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Compile schema text that has already been preprocessed (or that uses no
/// preprocessor features at all). `filename` is used in diagnostics and as
/// the top-level file for linemarker tracking.
pub fn compile_str(text: &str, filename: &str) -> Result<Registry, SchemaError> {
    let tokens = tokenize(text, filename)?;
    let mut registry = Registry::seeded();
    parse(&tokens, &mut registry)?;
    Ok(registry)
}

/// Preprocess and compile a schema file.
pub fn compile_file(path: &Path, timeout: Duration) -> Result<Registry, SchemaError> {
    let text = preprocess(path, timeout)?;
    compile_str(&text, &path.to_string_lossy())
}

/// Run the C preprocessor over the schema, which gives it `#include` and
/// macro support for free. Linemarkers are kept in the output so the
/// tokenizer can report positions in terms of the original files.
///
/// The child is killed if it does not finish within `timeout`.
pub fn preprocess(path: &Path, timeout: Duration) -> Result<String, SchemaError> {
    let mut child = Command::new("cpp")
        .arg("-x")
        .arg("c++")
        .arg("-traditional-cpp")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SchemaError::Preprocess(format!("could not run cpp: {}", e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut out = String::new();
        if let Some(mut stream) = stdout {
            let _ = stream.read_to_string(&mut out);
        }
        let mut err = String::new();
        if let Some(mut stream) = stderr {
            let _ = stream.read_to_string(&mut err);
        }
        let _ = tx.send((out, err));
    });

    match rx.recv_timeout(timeout) {
        Ok((out, err_text)) => {
            let status = child.wait()?;
            if status.success() {
                Ok(out)
            } else {
                Err(SchemaError::Preprocess(format!(
                    "cpp exited with {}: {}",
                    status,
                    err_text.trim()
                )))
            }
        }
        Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(SchemaError::Preprocess(format!(
                "cpp did not finish within {:?}",
                timeout
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefKind, BUILTIN_NAMES};

    #[test]
    fn compile_str_builds_a_registry() {
        let registry = compile_str(
            "Kind = enum { K_A K_B }\nItem = struct { Kind kind astring name }\n",
            "test.tgr",
        )
        .unwrap();
        assert_eq!(registry.len(), BUILTIN_NAMES.len() + 2);

        let item = registry.get(registry.lookup("Item").unwrap());
        assert_eq!(item.file, "test.tgr");
        match &item.kind {
            DefKind::Struct { fields } => assert_eq!(fields.len(), 2),
            kind => panic!("not a struct: {:?}", kind),
        }
    }

    #[test]
    fn first_error_is_reported() {
        let err = compile_str("A = Missing\nB = AlsoMissing\n", "test.tgr").unwrap_err();
        assert_eq!(err.to_string(), "test.tgr:1:5: unknown base type \"Missing\".");
    }
}

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SchemaError;
use crate::utils::quote;

lazy_static! {
    static ref LINEMARKER: Regex =
        Regex::new(r#"^#\s+(\d+)\s+"([^"]*)"((?:\s+\d+)*)\s*$"#).unwrap();
}

/// Linemarker flag set when the preprocessor enters an included file.
const FLAG_ENTER: u32 = 1;
/// Linemarker flag set when the preprocessor returns to the including file.
const FLAG_EXIT: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Unquoted identifier-like string.
    Word(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Double-quoted string, escapes decoded.
    DString(String),
    /// Single-quoted string, escapes decoded.
    SString(String),
    OParen,
    CParen,
    OBrace,
    CBrace,
    Equals,
    Colon,
    /// Synthesized when a linemarker records entry into an included file.
    /// Carries the included file's name.
    IncludeEnter(String),
    /// Synthesized when a linemarker records return to the including file.
    IncludeExit,
    Eof,
}

impl TokenKind {
    /// A short description for diagnostics, e.g. `identifier "Foo"` or `'='`.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Word(s) => format!("identifier {}", quote(s)),
            TokenKind::Int(v) => format!("integer {}", v),
            TokenKind::Float(v) => format!("float {}", v),
            TokenKind::Bool(v) => format!("boolean {}", v),
            TokenKind::DString(s) => format!("string {}", quote(s)),
            TokenKind::SString(s) => format!("quoted string {}", quote(s)),
            TokenKind::OParen => "'('".to_string(),
            TokenKind::CParen => "')'".to_string(),
            TokenKind::OBrace => "'{'".to_string(),
            TokenKind::CBrace => "'}'".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::IncludeEnter(_) => "include entry".to_string(),
            TokenKind::IncludeExit => "include exit".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// One token, carrying the position of its first character. `file` and `line`
/// follow linemarkers, so positions refer to the pre-expansion sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Space,
    Word,
    Integer,
    Float,
    DQuote,
    SQuote,
    Escape,
    Marker,
}

struct Tokenizer<'a> {
    chars: std::str::Chars<'a>,
    pushback: Option<char>,
    /// The file the current character belongs to; retargeted by linemarkers.
    file: String,
    /// The claimed name of the outermost input, used to recognize the
    /// preamble linemarker.
    top_file: String,
    line: usize,
    column: usize,
    seen_preamble: bool,
    tokens: Vec<Token>,
    scratch: String,
    scratch_file: String,
    scratch_line: usize,
    scratch_column: usize,
}

/// Convert schema text into an ordered token stream. `filename` is the name
/// the input claims to come from; it is stamped on tokens and matched against
/// the preamble linemarker. The stream always ends with an `Eof` token.
pub fn tokenize(text: &str, filename: &str) -> Result<Vec<Token>, SchemaError> {
    Tokenizer {
        chars: text.chars(),
        pushback: None,
        file: filename.to_string(),
        top_file: filename.to_string(),
        line: 1,
        column: 0,
        seen_preamble: false,
        tokens: Vec::new(),
        scratch: String::new(),
        scratch_file: String::new(),
        scratch_line: 0,
        scratch_column: 0,
    }
    .run()
}

impl<'a> Tokenizer<'a> {
    fn get(&mut self) -> Option<char> {
        self.pushback.take().or_else(|| self.chars.next())
    }

    /// Push the terminating character of a multi-character token back so the
    /// whitespace state re-examines it.
    fn unget(&mut self, c: char) {
        self.pushback = Some(c);
        self.column -= 1;
    }

    fn start_scratch(&mut self, c: char) {
        self.begin_scratch();
        self.scratch.push(c);
    }

    fn begin_scratch(&mut self) {
        self.scratch.clear();
        self.scratch_file = self.file.clone();
        self.scratch_line = self.line;
        self.scratch_column = self.column;
    }

    fn scratch_error(&self, msg: impl Into<String>) -> SchemaError {
        SchemaError::syntax(&self.scratch_file, self.scratch_line, self.scratch_column, msg)
    }

    fn here_error(&self, msg: impl Into<String>) -> SchemaError {
        SchemaError::syntax(&self.file, self.line, self.column, msg)
    }

    fn push_scratch(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            file: self.scratch_file.clone(),
            line: self.scratch_line,
            column: self.scratch_column,
        });
    }

    fn push_here(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            file: self.file.clone(),
            line: self.line,
            column: self.column,
        });
    }

    fn finish_word(&mut self) {
        let text = std::mem::take(&mut self.scratch);
        let kind = match text.as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Word(text),
        };
        self.push_scratch(kind);
    }

    fn finish_integer(&mut self) -> Result<(), SchemaError> {
        match parse_int(&self.scratch) {
            Some(value) => {
                self.push_scratch(TokenKind::Int(value));
                Ok(())
            }
            None => Err(self.scratch_error("badly formatted number")),
        }
    }

    fn finish_float(&mut self) -> Result<(), SchemaError> {
        match self.scratch.parse::<f64>() {
            Ok(value) => {
                self.push_scratch(TokenKind::Float(value));
                Ok(())
            }
            Err(_) => Err(self.scratch_error("badly formatted number")),
        }
    }

    /// Parse an accumulated `# <line> "<file>" <flag>*` linemarker. The
    /// marker retargets the tracked file and line. After the preamble (the
    /// first marker naming the top-level file at line 1), markers flagged as
    /// file entry or exit additionally emit synthetic include tokens.
    fn finish_marker(&mut self) -> Result<(), SchemaError> {
        let text = std::mem::take(&mut self.scratch);

        let caps = match LINEMARKER.captures(&text) {
            Some(caps) => caps,
            None => return Err(self.scratch_error(format!("malformed line marker {}", quote(&text)))),
        };

        let line: usize = match caps[1].parse() {
            Ok(line) => line,
            Err(_) => return Err(self.scratch_error(format!("malformed line marker {}", quote(&text)))),
        };
        let marker_file = caps[2].to_string();
        let flags: Vec<u32> = caps[3]
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();

        if self.seen_preamble {
            if flags.contains(&FLAG_ENTER) {
                self.tokens.push(Token {
                    kind: TokenKind::IncludeEnter(marker_file.clone()),
                    file: marker_file.clone(),
                    line,
                    column: 1,
                });
            } else if flags.contains(&FLAG_EXIT) {
                self.tokens.push(Token {
                    kind: TokenKind::IncludeExit,
                    file: marker_file.clone(),
                    line,
                    column: 1,
                });
            }
        } else if marker_file == self.top_file && line == 1 {
            self.seen_preamble = true;
        }

        self.file = marker_file;
        self.line = line;
        self.column = 0;

        Ok(())
    }

    fn run(mut self) -> Result<Vec<Token>, SchemaError> {
        let mut state = State::Space;
        let mut escape_return = State::DQuote;

        loop {
            let c = self.get();

            match c {
                Some('\n') => {
                    self.line += 1;
                    self.column = 0;
                }
                Some(_) => self.column += 1,
                None => {}
            }

            match state {
                State::Space => match c {
                    None => break,
                    Some(ch) if ch.is_ascii_digit() => {
                        self.start_scratch(ch);
                        state = State::Integer;
                    }
                    Some('.') => {
                        self.start_scratch('.');
                        state = State::Float;
                    }
                    Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                        self.start_scratch(ch);
                        state = State::Word;
                    }
                    Some('"') => {
                        self.begin_scratch();
                        state = State::DQuote;
                    }
                    Some('\'') => {
                        self.begin_scratch();
                        state = State::SQuote;
                    }
                    Some('#') => {
                        self.start_scratch('#');
                        state = State::Marker;
                    }
                    Some('(') => self.push_here(TokenKind::OParen),
                    Some(')') => self.push_here(TokenKind::CParen),
                    Some('{') => self.push_here(TokenKind::OBrace),
                    Some('}') => self.push_here(TokenKind::CBrace),
                    Some('=') => self.push_here(TokenKind::Equals),
                    Some(':') => self.push_here(TokenKind::Colon),
                    Some(ch) if ch.is_whitespace() => {}
                    Some(ch) => {
                        return Err(self.here_error(format!(
                            "unexpected character '{}' (ascii {})",
                            ch, ch as u32
                        )));
                    }
                },
                State::Word => match c {
                    Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' => self.scratch.push(ch),
                    c => {
                        self.finish_word();
                        if let Some(ch) = c {
                            if !ch.is_whitespace() {
                                self.unget(ch);
                            }
                        }
                        state = State::Space;
                    }
                },
                State::Integer => match c {
                    Some(ch) if ch == '.' || ch.to_ascii_lowercase() == 'e' => {
                        self.scratch.push(ch);
                        state = State::Float;
                    }
                    Some(ch) if ch.is_ascii_hexdigit() || ch.to_ascii_lowercase() == 'x' => {
                        self.scratch.push(ch);
                    }
                    Some(ch) if ch.is_ascii_alphabetic() => {
                        return Err(self.scratch_error("badly formatted number"));
                    }
                    c => {
                        self.finish_integer()?;
                        if let Some(ch) = c {
                            if !ch.is_whitespace() {
                                self.unget(ch);
                            }
                        }
                        state = State::Space;
                    }
                },
                State::Float => match c {
                    Some(ch) if ch.is_ascii_digit() || ch.to_ascii_lowercase() == 'e' => {
                        self.scratch.push(ch);
                    }
                    Some(ch) if ch.is_ascii_alphabetic() || ch == '.' => {
                        return Err(self.scratch_error("badly formatted number"));
                    }
                    c => {
                        self.finish_float()?;
                        if let Some(ch) = c {
                            if !ch.is_whitespace() {
                                self.unget(ch);
                            }
                        }
                        state = State::Space;
                    }
                },
                State::DQuote | State::SQuote => match c {
                    Some('"') if state == State::DQuote => {
                        let text = std::mem::take(&mut self.scratch);
                        self.push_scratch(TokenKind::DString(text));
                        state = State::Space;
                    }
                    Some('\'') if state == State::SQuote => {
                        let text = std::mem::take(&mut self.scratch);
                        self.push_scratch(TokenKind::SString(text));
                        state = State::Space;
                    }
                    Some('\\') => {
                        escape_return = state;
                        state = State::Escape;
                    }
                    None => return Err(self.scratch_error("unterminated string")),
                    Some(ch) => self.scratch.push(ch),
                },
                State::Escape => {
                    match c {
                        None => return Err(self.scratch_error("unterminated string")),
                        Some('\\') => self.scratch.push('\\'),
                        Some('n') => self.scratch.push('\n'),
                        Some('r') => self.scratch.push('\r'),
                        Some('t') => self.scratch.push('\t'),
                        Some(ch) => self.scratch.push(ch),
                    }
                    state = escape_return;
                }
                State::Marker => match c {
                    Some('\n') | None => {
                        self.finish_marker()?;
                        state = State::Space;
                    }
                    Some(ch) => self.scratch.push(ch),
                },
            }

            if c.is_none() {
                break;
            }
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            file: self.file.clone(),
            line: self.line,
            column: self.column,
        });

        Ok(self.tokens)
    }
}

/// Parse an integer literal the way `strtol` with base 0 would: `0x` prefixed
/// hexadecimal, `0` prefixed octal, otherwise decimal.
fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "<string>";

    fn kinds_and_positions(text: &str) -> Vec<(TokenKind, usize, usize)> {
        let tokens = tokenize(text, FILE).expect("tokenize failed");
        assert_eq!(tokens.last().map(|t| t.kind.clone()), Some(TokenKind::Eof));
        tokens[..tokens.len() - 1]
            .iter()
            .map(|t| {
                assert_eq!(t.file, FILE);
                (t.kind.clone(), t.line, t.column)
            })
            .collect()
    }

    fn error_of(text: &str) -> String {
        tokenize(text, FILE).unwrap_err().to_string()
    }

    #[test]
    fn simple_word() {
        assert_eq!(
            kinds_and_positions("Test1a"),
            vec![(TokenKind::Word("Test1a".into()), 1, 1)]
        );
        assert_eq!(
            kinds_and_positions("Test2a\n"),
            vec![(TokenKind::Word("Test2a".into()), 1, 1)]
        );
        assert_eq!(
            kinds_and_positions("ABC_123\n"),
            vec![(TokenKind::Word("ABC_123".into()), 1, 1)]
        );
    }

    #[test]
    fn mixed_literals_with_columns() {
        assert_eq!(
            kinds_and_positions("Test3a \"Test3b\" 'Goodbye' 123 0.5 1e2 0x10 0777"),
            vec![
                (TokenKind::Word("Test3a".into()), 1, 1),
                (TokenKind::DString("Test3b".into()), 1, 8),
                (TokenKind::SString("Goodbye".into()), 1, 17),
                (TokenKind::Int(123), 1, 27),
                (TokenKind::Float(0.5), 1, 31),
                (TokenKind::Float(100.0), 1, 35),
                (TokenKind::Int(16), 1, 39),
                (TokenKind::Int(511), 1, 44),
            ]
        );
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            kinds_and_positions("Test4a(Test4b{})"),
            vec![
                (TokenKind::Word("Test4a".into()), 1, 1),
                (TokenKind::OParen, 1, 7),
                (TokenKind::Word("Test4b".into()), 1, 8),
                (TokenKind::OBrace, 1, 14),
                (TokenKind::CBrace, 1, 15),
                (TokenKind::CParen, 1, 16),
            ]
        );
        assert_eq!(
            kinds_and_positions("Take note: Pi = 3.14"),
            vec![
                (TokenKind::Word("Take".into()), 1, 1),
                (TokenKind::Word("note".into()), 1, 6),
                (TokenKind::Colon, 1, 10),
                (TokenKind::Word("Pi".into()), 1, 12),
                (TokenKind::Equals, 1, 15),
                (TokenKind::Float(3.14), 1, 17),
            ]
        );
    }

    #[test]
    fn bunched_strings() {
        assert_eq!(
            kinds_and_positions("'A'B\"C\""),
            vec![
                (TokenKind::SString("A".into()), 1, 1),
                (TokenKind::Word("B".into()), 1, 4),
                (TokenKind::DString("C".into()), 1, 5),
            ]
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(
            kinds_and_positions("'\\t\\r\\n\\\\'"),
            vec![(TokenKind::SString("\t\r\n\\".into()), 1, 1)]
        );
        // Unknown escapes pass the character through literally.
        assert_eq!(
            kinds_and_positions("\"a\\qb\""),
            vec![(TokenKind::DString("aqb".into()), 1, 1)]
        );
    }

    #[test]
    fn booleans() {
        assert_eq!(
            kinds_and_positions("true false truest"),
            vec![
                (TokenKind::Bool(true), 1, 1),
                (TokenKind::Bool(false), 1, 6),
                (TokenKind::Word("truest".into()), 1, 12),
            ]
        );
    }

    #[test]
    fn line_tracking() {
        assert_eq!(
            kinds_and_positions("a\n  b\nc"),
            vec![
                (TokenKind::Word("a".into()), 1, 1),
                (TokenKind::Word("b".into()), 2, 3),
                (TokenKind::Word("c".into()), 3, 1),
            ]
        );
    }

    #[test]
    fn bad_numbers() {
        assert_eq!(error_of("123XYZ"), "<string>:1:1: badly formatted number.");
        assert_eq!(error_of("0123456789"), "<string>:1:1: badly formatted number.");
        assert_eq!(
            error_of("0x123456789ABCDEFG"),
            "<string>:1:1: badly formatted number."
        );
        assert_eq!(error_of("1.2.3"), "<string>:1:1: badly formatted number.");
    }

    #[test]
    fn bad_characters() {
        assert_eq!(
            error_of("\\t"),
            "<string>:1:1: unexpected character '\\' (ascii 92)."
        );
        assert_eq!(
            error_of("a @ b"),
            "<string>:1:3: unexpected character '@' (ascii 64)."
        );
    }

    #[test]
    fn unterminated_strings() {
        assert_eq!(error_of("xyz'abc"), "<string>:1:4: unterminated string.");
        assert_eq!(error_of("xyz\"abc"), "<string>:1:4: unterminated string.");
        assert_eq!(error_of("\"abc\\"), "<string>:1:1: unterminated string.");
    }

    #[test]
    fn linemarkers_retarget_positions() {
        let text = "# 1 \"top.tgr\"\nA = int32\n";
        let tokens = tokenize(text, "top.tgr").unwrap();
        assert_eq!(tokens[0].file, "top.tgr");
        assert_eq!(tokens[0].kind, TokenKind::Word("A".into()));
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!(tokens[1].kind, TokenKind::Equals);
        assert_eq!((tokens[1].line, tokens[1].column), (1, 3));
    }

    #[test]
    fn linemarkers_synthesize_include_tokens() {
        let text = concat!(
            "# 1 \"top.tgr\"\n",
            "A = int32\n",
            "# 1 \"inc.tgr\" 1\n",
            "B = int32\n",
            "# 3 \"top.tgr\" 2\n",
            "C = B\n",
        );
        let tokens = tokenize(text, "top.tgr").unwrap();
        let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Word("A".into()),
                &TokenKind::Equals,
                &TokenKind::Word("int32".into()),
                &TokenKind::IncludeEnter("inc.tgr".into()),
                &TokenKind::Word("B".into()),
                &TokenKind::Equals,
                &TokenKind::Word("int32".into()),
                &TokenKind::IncludeExit,
                &TokenKind::Word("C".into()),
                &TokenKind::Equals,
                &TokenKind::Word("B".into()),
                &TokenKind::Eof,
            ]
        );
        // Tokens inside the include carry its file and lines.
        assert_eq!(tokens[4].file, "inc.tgr");
        assert_eq!((tokens[4].line, tokens[4].column), (1, 1));
        // And the tokens after the return carry the outer file again.
        assert_eq!(tokens[8].file, "top.tgr");
        assert_eq!((tokens[8].line, tokens[8].column), (3, 1));
    }

    #[test]
    fn include_tokens_require_the_preamble() {
        // Without a preamble marker, entry/exit flags are not synthesized.
        let text = "# 1 \"other.tgr\" 1\nA = int32\n";
        let tokens = tokenize(text, "top.tgr").unwrap();
        assert!(tokens
            .iter()
            .all(|t| !matches!(t.kind, TokenKind::IncludeEnter(_) | TokenKind::IncludeExit)));
    }

    #[test]
    fn malformed_linemarker() {
        let err = error_of("# what \"is\" this\n");
        assert!(err.contains("malformed line marker"), "{}", err);
    }
}

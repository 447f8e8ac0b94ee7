use std::collections::HashSet;

use crate::error::SchemaError;
use crate::tokenizer::{Token, TokenKind};
use crate::types::{
    ConstValue, DefId, DefKind, Definition, EnumItem, Registry, StructField, UnionArm,
};
use crate::utils::quote;

/// Consume `tokens` and append the validated definitions to `registry`,
/// which must already be seeded with the builtins. Parsing halts at the
/// first error; there is no recovery or multi-error reporting.
pub fn parse(tokens: &[Token], registry: &mut Registry) -> Result<(), SchemaError> {
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        entered: HashSet::new(),
    }
    .run(registry)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Current inclusion depth, driven by the synthetic include tokens.
    depth: usize,
    /// Files for which an include placeholder has already been appended.
    entered: HashSet<String>,
}

fn err_at(tok: &Token, msg: impl Into<String>) -> SchemaError {
    SchemaError::syntax(&tok.file, tok.line, tok.column, msg)
}

fn expected(what: &str, tok: &Token) -> SchemaError {
    err_at(tok, format!("expected {}, got {}", what, tok.kind.describe()))
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &'a Token {
        let tok = &self.tokens[self.pos];
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kind(&mut self, kind: &TokenKind, what: &str) -> Result<&'a Token, SchemaError> {
        let tok = self.peek();
        if &tok.kind == kind {
            self.pos += 1;
            Ok(tok)
        } else {
            Err(expected(what, tok))
        }
    }

    fn expect_word(&mut self) -> Result<(&'a str, &'a Token), SchemaError> {
        let tok = self.peek();
        if let TokenKind::Word(s) = &tok.kind {
            self.pos += 1;
            Ok((s.as_str(), tok))
        } else {
            Err(expected("identifier", tok))
        }
    }

    fn expect_int(&mut self) -> Result<i64, SchemaError> {
        let tok = self.peek();
        if let TokenKind::Int(v) = tok.kind {
            self.pos += 1;
            Ok(v)
        } else {
            Err(expected("integer", tok))
        }
    }

    fn lookup_type(
        &self,
        registry: &Registry,
        name: &str,
        tok: &Token,
    ) -> Result<DefId, SchemaError> {
        registry
            .lookup(name)
            .ok_or_else(|| err_at(tok, format!("unknown type {}", quote(name))))
    }

    fn run(mut self, registry: &mut Registry) -> Result<(), SchemaError> {
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::IncludeEnter(path) => {
                    let path = path.clone();
                    let tok = self.advance();
                    self.depth += 1;
                    // The first entry into a file at depth 1 leaves a
                    // placeholder so renderers can see the file boundary.
                    if self.depth == 1 && self.entered.insert(path.clone()) {
                        registry.append_unindexed(Definition {
                            name: path.clone(),
                            file: tok.file.clone(),
                            line: tok.line,
                            depth: self.depth,
                            builtin: false,
                            kind: DefKind::Include { path },
                        });
                    }
                }
                TokenKind::IncludeExit => {
                    self.advance();
                    self.depth = self.depth.saturating_sub(1);
                }
                _ => self.statement(registry)?,
            }
        }
    }

    /// One `name = production` statement. The new definition is appended to
    /// the registry, which makes it visible to every later statement.
    fn statement(&mut self, registry: &mut Registry) -> Result<(), SchemaError> {
        let (name, name_tok) = self.expect_word()?;
        if registry.lookup(name).is_some() {
            return Err(err_at(
                name_tok,
                format!("the type {} is defined twice", quote(name)),
            ));
        }

        self.expect_kind(&TokenKind::Equals, "'='")?;

        let prod_tok = self.peek();
        let prod = match &prod_tok.kind {
            TokenKind::Word(s) => s.as_str(),
            _ => return Err(expected("identifier", prod_tok)),
        };
        self.pos += 1;

        let kind = match prod {
            "const" => self.parse_const(registry)?,
            "array" => self.parse_array(registry)?,
            "struct" => self.parse_struct(registry)?,
            "enum" => self.parse_enum()?,
            "union" => self.parse_union(registry)?,
            _ => match registry.lookup(prod) {
                Some(base) => DefKind::Alias { base },
                None => {
                    return Err(err_at(
                        prod_tok,
                        format!("unknown base type {}", quote(prod)),
                    ));
                }
            },
        };

        registry.append(Definition {
            name: name.to_string(),
            file: name_tok.file.clone(),
            line: name_tok.line,
            depth: self.depth,
            builtin: false,
            kind,
        });

        Ok(())
    }

    /// `const <type> <literal>`; the type must resolve to a scalar or string
    /// builtin and the literal token must match its kind.
    fn parse_const(&mut self, registry: &Registry) -> Result<DefKind, SchemaError> {
        let (type_name, type_tok) = self.expect_word()?;
        let base = self.lookup_type(registry, type_name, type_tok)?;

        let value = match &registry.get(registry.resolve(base)).kind {
            DefKind::Int { .. } => ConstValue::Int(self.expect_int()?),
            DefKind::Bool => {
                let tok = self.peek();
                match tok.kind {
                    TokenKind::Bool(b) => {
                        self.pos += 1;
                        ConstValue::Bool(b)
                    }
                    _ => return Err(expected("boolean", tok)),
                }
            }
            // Float constants accept an integer literal as well.
            DefKind::Float { .. } => {
                let tok = self.peek();
                match tok.kind {
                    TokenKind::Int(v) => {
                        self.pos += 1;
                        ConstValue::Float(v as f64)
                    }
                    TokenKind::Float(v) => {
                        self.pos += 1;
                        ConstValue::Float(v)
                    }
                    _ => return Err(expected("float", tok)),
                }
            }
            DefKind::AString | DefKind::WString => {
                let tok = self.peek();
                match &tok.kind {
                    TokenKind::DString(s) => {
                        self.pos += 1;
                        ConstValue::Str(s.clone())
                    }
                    _ => return Err(expected("string", tok)),
                }
            }
            _ => {
                return Err(err_at(
                    type_tok,
                    format!("invalid const type {}", quote(type_name)),
                ));
            }
        };

        Ok(DefKind::Const { base, value })
    }

    /// `array ( <item-type> <item-name> )`.
    fn parse_array(&mut self, registry: &Registry) -> Result<DefKind, SchemaError> {
        self.expect_kind(&TokenKind::OParen, "'('")?;

        let (item_type, type_tok) = self.expect_word()?;
        let item = self.lookup_type(registry, item_type, type_tok)?;
        if registry.is_void(item) {
            return Err(err_at(type_tok, "can not have an array of void"));
        }

        let (item_name, _) = self.expect_word()?;
        self.expect_kind(&TokenKind::CParen, "')'")?;

        Ok(DefKind::Array {
            item,
            item_name: item_name.to_string(),
        })
    }

    /// `struct { [opt] <type> <name> ... }`.
    fn parse_struct(&mut self, registry: &Registry) -> Result<DefKind, SchemaError> {
        self.expect_kind(&TokenKind::OBrace, "'{'")?;

        let mut fields = Vec::new();

        while matches!(self.peek().kind, TokenKind::Word(_)) {
            let mut tok = self.peek();
            let mut word = match &tok.kind {
                TokenKind::Word(w) => w.as_str(),
                _ => unreachable!(),
            };

            let optional = word == "opt";
            if optional {
                self.pos += 1;
                tok = self.peek();
                word = match &tok.kind {
                    TokenKind::Word(w) if w == "opt" => {
                        return Err(err_at(tok, format!("duplicate {} modifier", quote("opt"))));
                    }
                    TokenKind::Word(w) => w.as_str(),
                    _ => return Err(expected("identifier", tok)),
                };
            }

            let def = self.lookup_type(registry, word, tok)?;
            if registry.is_void(def) {
                return Err(err_at(tok, "can not have void as structure element"));
            }
            self.pos += 1;

            let (field_name, _) = self.expect_word()?;
            fields.push(StructField {
                name: field_name.to_string(),
                def,
                optional,
            });
        }

        self.expect_kind(&TokenKind::CBrace, "'}'")?;

        Ok(DefKind::Struct { fields })
    }

    /// `enum { <name> [= <value>] ... }`. Values default to one past the
    /// previous one, starting at 0; the byte width covers the maximum.
    fn parse_enum(&mut self) -> Result<DefKind, SchemaError> {
        self.expect_kind(&TokenKind::OBrace, "'{'")?;

        let mut items = Vec::new();
        let mut next_value: i64 = 0;
        let mut max_value: i64 = 0;

        while matches!(self.peek().kind, TokenKind::Word(_)) {
            let (name, _) = self.expect_word()?;

            let value = if self.eat(&TokenKind::Equals) {
                let v = self.expect_int()?;
                next_value = v.saturating_add(1);
                v
            } else {
                let v = next_value;
                next_value = next_value.saturating_add(1);
                v
            };
            max_value = max_value.max(value);

            items.push(EnumItem {
                name: name.to_string(),
                value,
            });
        }

        self.expect_kind(&TokenKind::CBrace, "'}'")?;

        Ok(DefKind::Enum {
            items,
            width: enum_width(max_value),
        })
    }

    /// `union ( <discr-type> <discr-name> ) { <literal> : <type> [<name>] ... }`.
    fn parse_union(&mut self, registry: &Registry) -> Result<DefKind, SchemaError> {
        self.expect_kind(&TokenKind::OParen, "'('")?;

        let (discr_type, discr_tok) = self.expect_word()?;
        let discr = self.lookup_type(registry, discr_type, discr_tok)?;
        if !registry.is_integer(discr) {
            return Err(err_at(
                discr_tok,
                format!("can't use {} as discriminator type", quote(discr_type)),
            ));
        }

        let (discr_name, _) = self.expect_word()?;
        self.expect_kind(&TokenKind::CParen, "')'")?;
        self.expect_kind(&TokenKind::OBrace, "'{'")?;

        let mut arms = Vec::new();

        while matches!(self.peek().kind, TokenKind::Word(_)) {
            let (value, _) = self.expect_word()?;
            self.expect_kind(&TokenKind::Colon, "':'")?;

            let (arm_type, arm_tok) = self.expect_word()?;
            let def = self.lookup_type(registry, arm_type, arm_tok)?;

            // A void arm carries no payload and therefore no field name.
            let name = if registry.is_void(def) {
                None
            } else {
                let (n, _) = self.expect_word()?;
                Some(n.to_string())
            };

            arms.push(UnionArm {
                value: value.to_string(),
                def,
                name,
            });
        }

        self.expect_kind(&TokenKind::CBrace, "'}'")?;

        Ok(DefKind::Union {
            discr_name: discr_name.to_string(),
            discr,
            arms,
        })
    }
}

/// Minimum number of bytes needed to represent `max_value` as an unsigned
/// big-endian integer, capped at 4.
fn enum_width(max_value: i64) -> usize {
    if max_value >= 1 << 24 {
        4
    } else if max_value >= 1 << 16 {
        3
    } else if max_value >= 1 << 8 {
        2
    } else {
        1
    }
}

use std::collections::HashMap;

use serde::Serialize;

/// Handle of a [`Definition`] inside its [`Registry`]. Handles are indices
/// into an append-only arena, so they stay valid for the registry's lifetime
/// and the graph contains no pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DefId(pub usize);

/// One named type or constant. Every definition is appended to the registry
/// exactly once, fully built, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub name: String,
    pub file: String,
    pub line: usize,
    /// Count of nested textual inclusions active when this definition was
    /// appended; 0 means the top-level file. Renderers use this to decide
    /// what to re-export.
    pub depth: usize,
    pub builtin: bool,
    pub kind: DefKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefKind {
    /// Fixed-width integer builtin; `size` in bytes (1, 2, 4 or 8).
    Int { size: usize, signed: bool },
    /// IEEE-754 float builtin; `size` in bytes (4 or 8).
    Float { size: usize },
    Bool,
    /// Narrow string builtin.
    AString,
    /// Wide string builtin; transcoded to UTF-8 on the wire.
    WString,
    Void,
    Alias { base: DefId },
    Array { item: DefId, item_name: String },
    Struct { fields: Vec<StructField> },
    Enum { items: Vec<EnumItem>, width: usize },
    Union {
        discr_name: String,
        discr: DefId,
        arms: Vec<UnionArm>,
    },
    Const { base: DefId, value: ConstValue },
    /// Placeholder marking the first entry into an included file. Excluded
    /// from name resolution; only renderers care about it.
    Include { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    pub name: String,
    pub def: DefId,
    /// Optional fields are wire-encoded with a one-byte presence flag.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumItem {
    pub name: String,
    pub value: i64,
}

/// One case of a union: the discriminator literal, the payload type (which
/// may resolve to void) and the field name (absent exactly when the payload
/// is void).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionArm {
    pub value: String,
    pub def: DefId,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// The append-only, insertion-ordered arena of definitions, with a hash
/// index from name to handle for O(1) lookups.
#[derive(Debug, Default, Serialize)]
pub struct Registry {
    defs: Vec<Definition>,
    #[serde(skip)]
    index: HashMap<String, DefId>,
}

/// Names of the builtin definitions every registry is seeded with.
pub const BUILTIN_NAMES: [&str; 14] = [
    "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "bool", "astring", "wstring", "void",
];

impl Registry {
    /// An empty registry with no definitions at all.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// A registry seeded with the builtin primitive set. This is the
    /// starting point for every parse.
    pub fn seeded() -> Registry {
        let mut registry = Registry::new();

        for signed in [false, true] {
            for size in [1usize, 2, 4, 8] {
                let name = format!("{}int{}", if signed { "" } else { "u" }, 8 * size);
                registry.append(Definition {
                    name,
                    file: "<builtin>".to_string(),
                    line: 0,
                    depth: 0,
                    builtin: true,
                    kind: DefKind::Int { size, signed },
                });
            }
        }

        for size in [4usize, 8] {
            registry.append(Definition {
                name: format!("float{}", 8 * size),
                file: "<builtin>".to_string(),
                line: 0,
                depth: 0,
                builtin: true,
                kind: DefKind::Float { size },
            });
        }

        for (name, kind) in [
            ("bool", DefKind::Bool),
            ("astring", DefKind::AString),
            ("wstring", DefKind::WString),
            ("void", DefKind::Void),
        ] {
            registry.append(Definition {
                name: name.to_string(),
                file: "<builtin>".to_string(),
                line: 0,
                depth: 0,
                builtin: true,
                kind,
            });
        }

        registry
    }

    /// Append a definition and index it by name. The caller must have
    /// checked for duplicates with [`Registry::lookup`] first.
    pub fn append(&mut self, def: Definition) -> DefId {
        let id = DefId(self.defs.len());
        self.index.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    /// Append an include placeholder without indexing it, so it never takes
    /// part in name resolution.
    pub fn append_unindexed(&mut self, def: Definition) -> DefId {
        let id = DefId(self.defs.len());
        self.defs.push(def);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: DefId) -> &Definition {
        &self.defs[id.0]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate definitions in insertion (file) order.
    pub fn iter(&self) -> impl Iterator<Item = (DefId, &Definition)> {
        self.defs.iter().enumerate().map(|(i, d)| (DefId(i), d))
    }

    /// Follow alias links until a non-alias definition is reached. Chains
    /// always terminate: an alias can only reference a definition appended
    /// before it, so the chain is strictly decreasing.
    pub fn resolve(&self, mut id: DefId) -> DefId {
        while let DefKind::Alias { base } = self.get(id).kind {
            id = base;
        }
        id
    }

    /// Whether `id` resolves through aliases to an integer or enum, the only
    /// kinds allowed as union discriminators.
    pub fn is_integer(&self, id: DefId) -> bool {
        matches!(
            self.get(self.resolve(id)).kind,
            DefKind::Int { .. } | DefKind::Enum { .. }
        )
    }

    /// Whether `id` resolves through aliases to void.
    pub fn is_void(&self, id: DefId) -> bool {
        matches!(self.get(self.resolve(id)).kind, DefKind::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_builtins() {
        let registry = Registry::seeded();
        assert_eq!(registry.len(), BUILTIN_NAMES.len());
        for name in BUILTIN_NAMES {
            let id = registry.lookup(name).expect(name);
            assert!(registry.get(id).builtin);
        }
        assert_eq!(
            registry.get(registry.lookup("uint16").unwrap()).kind,
            DefKind::Int { size: 2, signed: false }
        );
        assert_eq!(
            registry.get(registry.lookup("int64").unwrap()).kind,
            DefKind::Int { size: 8, signed: true }
        );
        assert_eq!(
            registry.get(registry.lookup("float32").unwrap()).kind,
            DefKind::Float { size: 4 }
        );
    }

    #[test]
    fn resolve_follows_alias_chains() {
        let mut registry = Registry::seeded();
        let int32 = registry.lookup("int32").unwrap();
        let c = registry.append(Definition {
            name: "C".into(),
            file: "t".into(),
            line: 1,
            depth: 0,
            builtin: false,
            kind: DefKind::Alias { base: int32 },
        });
        let b = registry.append(Definition {
            name: "B".into(),
            file: "t".into(),
            line: 2,
            depth: 0,
            builtin: false,
            kind: DefKind::Alias { base: c },
        });
        assert_eq!(registry.resolve(b), int32);
        assert!(registry.is_integer(b));
        assert!(!registry.is_void(b));
    }

    #[test]
    fn unindexed_definitions_do_not_resolve() {
        let mut registry = Registry::new();
        registry.append_unindexed(Definition {
            name: "other.tgr".into(),
            file: "top.tgr".into(),
            line: 1,
            depth: 1,
            builtin: false,
            kind: DefKind::Include { path: "other.tgr".into() },
        });
        assert_eq!(registry.lookup("other.tgr"), None);
        assert_eq!(registry.len(), 1);
    }
}

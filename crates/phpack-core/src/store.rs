//! SQLite-backed persistent store: files, symbols, dependency edges,
//! autoload rules, and optional decomposed ASTs.
//!
//! Single source of truth for the pipeline. All natural-key inserts are
//! upserts so re-running against unchanged input is a no-op; a file's
//! symbols and edges are replaced wholesale inside one transaction on
//! re-analysis.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::paths::basename;

/// Bump when changing table schemas; a mismatched store is rebuilt.
const SCHEMA_VERSION: i32 = 2;

/// Hard bound on the closure walk so corrupt state cannot hang the
/// emitter.
pub const MAX_CLOSURE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Entry,
    ClassBearing,
    Script,
    AutoloadConfig,
    Vendor,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Entry => "entry",
            FileKind::ClassBearing => "class-bearing",
            FileKind::Script => "script",
            FileKind::AutoloadConfig => "autoload-config",
            FileKind::Vendor => "vendor",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "entry" => FileKind::Entry,
            "class-bearing" => FileKind::ClassBearing,
            "autoload-config" => FileKind::AutoloadConfig,
            "vendor" => FileKind::Vendor,
            _ => FileKind::Script,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Interface,
    Trait,
    Function,
    Constant,
    Method,
    Property,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Function => "function",
            SymbolKind::Constant => "constant",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "interface" => SymbolKind::Interface,
            "trait" => SymbolKind::Trait,
            "function" => SymbolKind::Function,
            "constant" => SymbolKind::Constant,
            "method" => SymbolKind::Method,
            "property" => SymbolKind::Property,
            _ => SymbolKind::Class,
        }
    }

    /// Kinds that occupy the program-wide FQN namespace and therefore
    /// participate in autoload resolution.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Trait
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Require,
    RequireOnce,
    Include,
    IncludeOnce,
    Extends,
    Implements,
    UseTrait,
    UseClass,
    New,
    StaticCall,
    ClassConstFetch,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Require => "require",
            EdgeKind::RequireOnce => "require_once",
            EdgeKind::Include => "include",
            EdgeKind::IncludeOnce => "include_once",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::UseTrait => "use_trait",
            EdgeKind::UseClass => "use_class",
            EdgeKind::New => "new",
            EdgeKind::StaticCall => "static_call",
            EdgeKind::ClassConstFetch => "class_const_fetch",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "require_once" => EdgeKind::RequireOnce,
            "include" => EdgeKind::Include,
            "include_once" => EdgeKind::IncludeOnce,
            "extends" => EdgeKind::Extends,
            "implements" => EdgeKind::Implements,
            "use_trait" => EdgeKind::UseTrait,
            "use_class" => EdgeKind::UseClass,
            "new" => EdgeKind::New,
            "static_call" => EdgeKind::StaticCall,
            "class_const_fetch" => EdgeKind::ClassConstFetch,
            _ => EdgeKind::Require,
        }
    }

    /// Edges carrying a literal/reduced include context instead of a
    /// target symbol.
    pub fn is_include_like(&self) -> bool {
        matches!(
            self,
            EdgeKind::Require | EdgeKind::RequireOnce | EdgeKind::Include | EdgeKind::IncludeOnce
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// PSR-4 style prefix-to-directory map.
    PrefixMap,
    /// PSR-0 style map: underscores in the class segment become
    /// directory separators.
    LegacyPrefixMap,
    /// Direct FQN-to-file table entry.
    Classmap,
    /// Always-loaded file; never consulted for symbol resolution.
    Files,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::PrefixMap => "psr4",
            RuleKind::LegacyPrefixMap => "psr0",
            RuleKind::Classmap => "classmap",
            RuleKind::Files => "files",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "psr4" | "psr-4" => Some(RuleKind::PrefixMap),
            "psr0" | "psr-0" => Some(RuleKind::LegacyPrefixMap),
            "classmap" => Some(RuleKind::Classmap),
            "files" => Some(RuleKind::Files),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub absolute_path: String,
    pub content_hash: String,
    pub raw_content: Option<String>,
    pub class_kind: FileKind,
    pub skip_ast: bool,
    pub ast_root: Option<i64>,
    pub is_entry: bool,
}

/// Insert payload for [`Store::upsert_file`].
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub path: &'a str,
    pub absolute_path: &'a str,
    pub content_hash: &'a str,
    pub raw_content: Option<&'a str>,
    pub class_kind: FileKind,
    pub skip_ast: bool,
}

#[derive(Debug, Clone)]
pub struct SymbolRow {
    pub id: i64,
    pub file_id: i64,
    pub kind: SymbolKind,
    pub short_name: String,
    pub fqn: String,
    pub namespace: String,
    pub visibility: String,
    pub parent_symbol_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub id: i64,
    pub source_file_id: i64,
    pub target_symbol: Option<String>,
    pub target_file_id: Option<i64>,
    pub kind: EdgeKind,
    pub line: u32,
    pub is_conditional: bool,
    pub is_resolved: bool,
    pub is_external: bool,
    pub context: String,
}

#[derive(Debug, Clone)]
pub struct RuleRow {
    pub id: i64,
    pub kind: RuleKind,
    pub prefix: Option<String>,
    pub path: String,
    pub priority: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub files: i64,
    pub symbols: i64,
    pub edges: i64,
    pub unresolved_edges: i64,
}

/// One back edge discovered by the closure walk.
#[derive(Debug, Clone)]
pub struct ClosureCycle {
    pub edge_id: i64,
    pub kind: EdgeKind,
    pub source_file_id: i64,
    pub target_file_id: i64,
}

#[derive(Debug, Clone)]
pub struct Closure {
    /// Dependees first, entry last.
    pub files: Vec<FileRow>,
    pub cycles: Vec<ClosureCycle>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let current: i32 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;
        if current != 0 && current != SCHEMA_VERSION {
            conn.execute_batch(
                "DROP TABLE IF EXISTS ast_nodes;
                 DROP TABLE IF EXISTS autoload_rules;
                 DROP TABLE IF EXISTS dependencies;
                 DROP TABLE IF EXISTS symbols;
                 DROP TABLE IF EXISTS files;",
            )?;
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                absolute_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                raw_content TEXT,
                class_kind TEXT NOT NULL DEFAULT 'script',
                skip_ast INTEGER NOT NULL DEFAULT 0,
                ast_root INTEGER,
                is_entry INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                short_name TEXT NOT NULL,
                fqn TEXT NOT NULL,
                namespace TEXT NOT NULL DEFAULT '',
                visibility TEXT NOT NULL DEFAULT 'public',
                parent_symbol_id INTEGER,
                UNIQUE (file_id, fqn, kind)
            );
            CREATE INDEX IF NOT EXISTS idx_symbols_fqn ON symbols(fqn);
            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
            CREATE TABLE IF NOT EXISTS dependencies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                target_symbol TEXT,
                target_file_id INTEGER,
                kind TEXT NOT NULL,
                line INTEGER NOT NULL DEFAULT 0,
                is_conditional INTEGER NOT NULL DEFAULT 0,
                is_resolved INTEGER NOT NULL DEFAULT 0,
                is_external INTEGER NOT NULL DEFAULT 0,
                context TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_deps_source ON dependencies(source_file_id);
            CREATE INDEX IF NOT EXISTS idx_deps_pending
                ON dependencies(is_resolved, target_symbol);
            CREATE TABLE IF NOT EXISTS autoload_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                prefix TEXT,
                path TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                UNIQUE (kind, prefix, path)
            );
            CREATE TABLE IF NOT EXISTS ast_nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                parent_id INTEGER,
                node_type TEXT NOT NULL,
                fqcn TEXT,
                position_in_parent INTEGER NOT NULL DEFAULT 0,
                start_line INTEGER NOT NULL DEFAULT 0,
                end_line INTEGER NOT NULL DEFAULT 0,
                attributes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_ast_file ON ast_nodes(file_id);
            CREATE INDEX IF NOT EXISTS idx_ast_fqcn ON ast_nodes(fqcn);",
        )?;

        Ok(Self { conn })
    }

    /// Run `f` inside one transaction; rolled back on error so a failed
    /// analysis leaves prior committed state intact.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&Store) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    // Files

    /// Insert or replace a file row keyed on its canonical path. An
    /// existing row keeps its id and its entry marker.
    pub fn upsert_file(&self, file: &NewFile) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO files (path, absolute_path, content_hash, raw_content,
                                class_kind, skip_ast)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                absolute_path = excluded.absolute_path,
                content_hash = excluded.content_hash,
                raw_content = excluded.raw_content,
                class_kind = excluded.class_kind,
                skip_ast = excluded.skip_ast",
            params![
                file.path,
                file.absolute_path,
                file.content_hash,
                file.raw_content,
                file.class_kind.as_str(),
                file.skip_ast,
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![file.path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, path, absolute_path, content_hash, raw_content,
                        class_kind, skip_ast, ast_root, is_entry
                 FROM files WHERE path = ?1",
                params![path],
                file_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn file_by_id(&self, id: i64) -> Result<Option<FileRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, path, absolute_path, content_hash, raw_content,
                        class_kind, skip_ast, ast_root, is_entry
                 FROM files WHERE id = ?1",
                params![id],
                file_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Files whose basename equals `name`, for the include fallback.
    pub fn files_by_basename(&self, name: &str) -> Result<Vec<FileRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, absolute_path, content_hash, raw_content,
                    class_kind, skip_ast, ast_root, is_entry
             FROM files WHERE path = ?1 OR path LIKE ?2 ORDER BY id",
        )?;
        let pattern = format!("%/{name}");
        let rows = stmt.query_map(params![name, pattern], file_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            if basename(&row.path) == name {
                out.push(row);
            }
        }
        Ok(out)
    }

    pub fn all_files(&self) -> Result<Vec<FileRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, absolute_path, content_hash, raw_content,
                    class_kind, skip_ast, ast_root, is_entry
             FROM files ORDER BY id",
        )?;
        let rows = stmt.query_map([], file_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn mark_entry(&self, file_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE files SET is_entry = 1, class_kind = 'entry' WHERE id = ?1",
            params![file_id],
        )?;
        Ok(())
    }

    pub fn entry_file(&self) -> Result<Option<FileRow>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, path, absolute_path, content_hash, raw_content,
                        class_kind, skip_ast, ast_root, is_entry
                 FROM files WHERE is_entry = 1 ORDER BY id LIMIT 1",
                [],
                file_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn set_ast_root(&self, file_id: i64, node_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE files SET ast_root = ?2 WHERE id = ?1",
            params![file_id, node_id],
        )?;
        Ok(())
    }

    // Symbols

    pub fn add_symbol(
        &self,
        file_id: i64,
        kind: SymbolKind,
        short_name: &str,
        fqn: &str,
        namespace: &str,
        visibility: &str,
        parent_symbol_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO symbols (file_id, kind, short_name, fqn, namespace,
                                  visibility, parent_symbol_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(file_id, fqn, kind) DO UPDATE SET
                short_name = excluded.short_name,
                namespace = excluded.namespace,
                visibility = excluded.visibility,
                parent_symbol_id = excluded.parent_symbol_id",
            params![
                file_id,
                kind.as_str(),
                short_name,
                fqn,
                namespace,
                visibility,
                parent_symbol_id,
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM symbols WHERE file_id = ?1 AND fqn = ?2 AND kind = ?3",
            params![file_id, fqn, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn delete_symbols_of(&self, file_id: i64) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        Ok(())
    }

    pub fn symbols_of(&self, file_id: i64) -> Result<Vec<SymbolRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_id, kind, short_name, fqn, namespace, visibility,
                    parent_symbol_id
             FROM symbols WHERE file_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![file_id], symbol_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The file defining a type-like symbol with this FQN. Two distinct
    /// defining files make the program unresolvable.
    pub fn find_file_by_symbol(&self, fqn: &str) -> Result<Option<FileRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT f.id, f.path, f.absolute_path, f.content_hash,
                    f.raw_content, f.class_kind, f.skip_ast, f.ast_root, f.is_entry
             FROM symbols s JOIN files f ON f.id = s.file_id
             WHERE s.fqn = ?1 AND s.kind IN ('class', 'interface', 'trait')
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map(params![fqn], file_from_row)?;
        let mut found: Option<FileRow> = None;
        for row in rows {
            let row = row?;
            match &found {
                None => found = Some(row),
                Some(first) if first.id != row.id => {
                    return Err(StoreError::AmbiguousSymbol {
                        fqn: fqn.to_string(),
                        first: first.path.clone(),
                        second: row.path,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(found)
    }

    // Edges

    #[allow(clippy::too_many_arguments)]
    pub fn add_edge(
        &self,
        source_file_id: i64,
        kind: EdgeKind,
        target_symbol: Option<&str>,
        line: u32,
        is_conditional: bool,
        context: &str,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO dependencies (source_file_id, kind, target_symbol, line,
                                       is_conditional, context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source_file_id,
                kind.as_str(),
                target_symbol,
                line,
                is_conditional,
                context,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_edges_of(&self, file_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM dependencies WHERE source_file_id = ?1",
            params![file_id],
        )?;
        Ok(())
    }

    /// Bind an edge to its target file. Resolution is one-way; edges
    /// never transition back.
    pub fn resolve_edge(&self, edge_id: i64, target_file_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE dependencies SET target_file_id = ?2, is_resolved = 1
             WHERE id = ?1",
            params![edge_id, target_file_id],
        )?;
        Ok(())
    }

    /// Flag an edge as satisfied by the host runtime so the fixpoint
    /// stops revisiting it.
    pub fn mark_edge_external(&self, edge_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE dependencies SET is_external = 1 WHERE id = ?1",
            params![edge_id],
        )?;
        Ok(())
    }

    pub fn unresolved_edges(&self) -> Result<Vec<EdgeRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_file_id, target_symbol, target_file_id, kind, line,
                    is_conditional, is_resolved, is_external, context
             FROM dependencies
             WHERE is_resolved = 0 AND is_external = 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], edge_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn edges_of(&self, file_id: i64) -> Result<Vec<EdgeRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_file_id, target_symbol, target_file_id, kind, line,
                    is_conditional, is_resolved, is_external, context
             FROM dependencies WHERE source_file_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![file_id], edge_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // Autoload rules

    pub fn add_autoload_rule(
        &self,
        kind: RuleKind,
        prefix: Option<&str>,
        path: &str,
        priority: i64,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO autoload_rules (kind, prefix, path, priority)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind, prefix, path) DO UPDATE SET
                priority = excluded.priority",
            params![kind.as_str(), prefix, path, priority],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM autoload_rules WHERE kind = ?1 AND prefix IS ?2 AND path = ?3",
            params![kind.as_str(), prefix, path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Rules ordered the way the engine consults them: longest prefix
    /// first, then priority, then insertion order.
    pub fn autoload_rules_ordered(&self) -> Result<Vec<RuleRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, prefix, path, priority FROM autoload_rules
             ORDER BY LENGTH(COALESCE(prefix, '')) DESC, priority DESC, id",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(1)?;
            Ok(RuleRow {
                id: row.get(0)?,
                kind: RuleKind::from_str(&kind).unwrap_or(RuleKind::PrefixMap),
                prefix: row.get(2)?,
                path: row.get(3)?,
                priority: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // Stored AST nodes

    #[allow(clippy::too_many_arguments)]
    pub fn add_ast_node(
        &self,
        file_id: i64,
        parent_id: Option<i64>,
        node_type: &str,
        fqcn: Option<&str>,
        position_in_parent: i64,
        start_line: u32,
        end_line: u32,
        attributes: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO ast_nodes (file_id, parent_id, node_type, fqcn,
                                    position_in_parent, start_line, end_line, attributes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                file_id,
                parent_id,
                node_type,
                fqcn,
                position_in_parent,
                start_line,
                end_line,
                attributes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_ast_nodes_of(&self, file_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM ast_nodes WHERE file_id = ?1",
            params![file_id],
        )?;
        self.conn.execute(
            "UPDATE files SET ast_root = NULL WHERE id = ?1",
            params![file_id],
        )?;
        Ok(())
    }

    pub fn ast_node_count(&self, file_id: i64) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM ast_nodes WHERE file_id = ?1",
                params![file_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // Closure

    /// Reflexive-transitive closure of resolved edges from the entry,
    /// emitted dependees-first (each file after everything it depends
    /// on). Back edges are cut, recorded, and reported by the caller;
    /// the walk visits each file once and never descends past
    /// [`MAX_CLOSURE_DEPTH`].
    pub fn required_files_closure(&self, entry_id: i64) -> Result<Closure, StoreError> {
        let mut adjacency: HashMap<i64, Vec<(i64, EdgeKind, i64)>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT id, source_file_id, kind, target_file_id FROM dependencies
                 WHERE is_resolved = 1 ORDER BY source_file_id, id",
            )?;
            let rows = stmt.query_map([], |row| {
                let kind: String = row.get(2)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    EdgeKind::from_str(&kind),
                    row.get::<_, i64>(3)?,
                ))
            })?;
            for row in rows {
                let (edge_id, source, kind, target) = row?;
                adjacency
                    .entry(source)
                    .or_default()
                    .push((edge_id, kind, target));
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum State {
            OnStack,
            Done,
        }

        struct Frame {
            file: i64,
            next: usize,
        }

        let mut state: HashMap<i64, State> = HashMap::new();
        let mut order: Vec<i64> = Vec::new();
        let mut cycles: Vec<ClosureCycle> = Vec::new();

        state.insert(entry_id, State::OnStack);
        let mut stack = vec![Frame {
            file: entry_id,
            next: 0,
        }];

        loop {
            let (file, next) = match stack.last_mut() {
                Some(frame) => {
                    let pair = (frame.file, frame.next);
                    frame.next += 1;
                    pair
                }
                None => break,
            };
            let edges = adjacency.get(&file).map(Vec::as_slice).unwrap_or(&[]);
            if next < edges.len() {
                let (edge_id, kind, target) = edges[next];
                match state.get(&target) {
                    Some(State::OnStack) => {
                        cycles.push(ClosureCycle {
                            edge_id,
                            kind,
                            source_file_id: file,
                            target_file_id: target,
                        });
                    }
                    Some(State::Done) => {}
                    None => {
                        if stack.len() < MAX_CLOSURE_DEPTH {
                            state.insert(target, State::OnStack);
                            stack.push(Frame {
                                file: target,
                                next: 0,
                            });
                        }
                    }
                }
            } else {
                order.push(file);
                state.insert(file, State::Done);
                stack.pop();
            }
        }

        let mut files = Vec::with_capacity(order.len());
        for id in order {
            if let Some(row) = self.file_by_id(id)? {
                files.push(row);
            }
        }
        Ok(Closure { files, cycles })
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let files = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        let symbols = self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let edges = self
            .conn
            .query_row("SELECT COUNT(*) FROM dependencies", [], |r| r.get(0))?;
        let unresolved_edges = self.conn.query_row(
            "SELECT COUNT(*) FROM dependencies WHERE is_resolved = 0 AND is_external = 0",
            [],
            |r| r.get(0),
        )?;
        Ok(StoreStats {
            files,
            symbols,
            edges,
            unresolved_edges,
        })
    }
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    let kind: String = row.get(5)?;
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        absolute_path: row.get(2)?,
        content_hash: row.get(3)?,
        raw_content: row.get(4)?,
        class_kind: FileKind::from_str(&kind),
        skip_ast: row.get(6)?,
        ast_root: row.get(7)?,
        is_entry: row.get(8)?,
    })
}

fn symbol_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    let kind: String = row.get(2)?;
    Ok(SymbolRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        kind: SymbolKind::from_str(&kind),
        short_name: row.get(3)?,
        fqn: row.get(4)?,
        namespace: row.get(5)?,
        visibility: row.get(6)?,
        parent_symbol_id: row.get(7)?,
    })
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    let kind: String = row.get(4)?;
    Ok(EdgeRow {
        id: row.get(0)?,
        source_file_id: row.get(1)?,
        target_symbol: row.get(2)?,
        target_file_id: row.get(3)?,
        kind: EdgeKind::from_str(&kind),
        line: row.get(5)?,
        is_conditional: row.get(6)?,
        is_resolved: row.get(7)?,
        is_external: row.get(8)?,
        context: row.get(9)?,
    })
}

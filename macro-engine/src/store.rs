//! Script store: loads `.m` macro files and parses them into named graphs.
//!
//! # Source format
//!
//! ```text
//! -- comment
//! <name>
//! A:0.1
//! [other]*3
//! {
//!   B:0.1
//! }*2
//! DEFAULT>speed=2
//! ```
//!
//! Every retained line is trimmed and has its internal whitespace removed.
//! `<name>` opens a segment qualified by the file tag (`sub/file.m` gives
//! `sub.file.name`); lines before the first marker are ignored. A line
//! starting with `{` opens an anonymous block which is stored under a
//! generated name and replaced by a jump line carrying the closing suffix.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::eval::{Bindings, Value};
use crate::graph::Graph;

/// File extension of macro sources, compared case-insensitively.
pub const MACRO_EXT: &str = ".m";

/// Prefix of lines that declare a parameter default.
pub const DEFAULT_PREFIX: &str = "DEFAULT>";

/// Prefix of generated anonymous block names.
///
/// Never produced by the label qualifier, so generated names cannot clash
/// with user labels.
const ANONYMOUS_PREFIX: char = '@';

/// Something that can enumerate macro source files.
pub trait ScriptSource {
    /// Call `visit` once per file with its `/`-separated path relative to
    /// the source root and its text.
    fn visit_files(&self, visit: &mut dyn FnMut(&str, &str));
}

/// Table of `(relative_path, text)` pairs, as bundled into firmware images.
impl ScriptSource for [(&str, &str)] {
    fn visit_files(&self, visit: &mut dyn FnMut(&str, &str)) {
        for (path, text) in self {
            visit(path, text);
        }
    }
}

impl<const N: usize> ScriptSource for [(&str, &str); N] {
    fn visit_files(&self, visit: &mut dyn FnMut(&str, &str)) {
        self.as_slice().visit_files(visit);
    }
}

/// One named macro: its graph plus the parameter defaults it declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    graph: Graph,
    defaults: Bindings,
}

impl Script {
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn defaults(&self) -> &Bindings {
        &self.defaults
    }
}

/// All macros loaded from one source.
#[derive(Debug, Default)]
pub struct ScriptStore {
    named: BTreeMap<String, Script>,
    anonymous: BTreeMap<String, Graph>,
    next_anonymous: u32,
}

impl ScriptStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            named: BTreeMap::new(),
            anonymous: BTreeMap::new(),
            next_anonymous: 0,
        }
    }

    /// Load every macro file of `source`.
    pub fn load<S: ScriptSource + ?Sized>(source: &S) -> Self {
        let mut store = Self::new();
        store.reset(source);
        store
    }

    /// Drop everything and reload from `source`.
    pub fn reset<S: ScriptSource + ?Sized>(&mut self, source: &S) {
        self.named.clear();
        self.anonymous.clear();
        self.next_anonymous = 0;

        let mut files = 0u32;
        source.visit_files(&mut |path, text| {
            if is_script_path(path) {
                files += 1;
                self.load_file(path, text);
            }
        });

        info!(
            "script store: {} files, {} macros, {} blocks",
            files,
            self.named.len(),
            self.anonymous.len()
        );
    }

    /// Look up a named macro.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Script> {
        self.named.get(name)
    }

    /// Resolve a jump label to a graph, named macros first.
    #[must_use]
    pub fn graph(&self, label: &str) -> Option<&Graph> {
        self.named
            .get(label)
            .map(Script::graph)
            .or_else(|| self.anonymous.get(label))
    }

    /// Whether a named macro exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Names of all named macros, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// Number of named macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.named.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }

    fn load_file(&mut self, path: &str, text: &str) {
        let tag = file_tag(path);
        let rows: Vec<String> = text
            .lines()
            .filter_map(clean_line)
            .map(|row| qualify_label(row, &tag))
            .collect();
        if rows.is_empty() {
            return;
        }

        let parsed = parse_segments(rows, &tag, &mut self.next_anonymous);
        for (name, lines, defaults) in parsed.named {
            if lines.is_empty() {
                continue;
            }
            debug!("macro {} ({} lines)", name.as_str(), lines.len());
            self.named.insert(
                name,
                Script {
                    graph: Graph::from_lines(lines),
                    defaults,
                },
            );
        }
        for (name, lines) in parsed.anonymous {
            if !lines.is_empty() {
                self.anonymous.insert(name, Graph::from_lines(lines));
            }
        }
    }
}

/// Whether `path` names a macro file: `.m` extension in any case and no
/// path component starting with `.`.
fn is_script_path(path: &str) -> bool {
    let has_ext = path.len() > MACRO_EXT.len()
        && path
            .get(path.len() - MACRO_EXT.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MACRO_EXT));
    has_ext && !path.split('/').any(|part| part.starts_with('.'))
}

/// `sub/dir/file.m` becomes `sub.dir.file.`.
fn file_tag(path: &str) -> String {
    let stem = path
        .get(..path.len().saturating_sub(MACRO_EXT.len()))
        .unwrap_or_default();
    let mut tag = stem.replace('/', ".");
    tag.push('.');
    tag
}

fn clean_line(line: &str) -> Option<String> {
    let row = line.trim();
    if row.is_empty() || row.starts_with("--") || row.starts_with('#') {
        return None;
    }
    Some(row.chars().filter(|c| *c != ' ' && *c != '\t').collect())
}

/// Prefix a jump label that has no `.` with the file tag.
fn qualify_label(row: String, tag: &str) -> String {
    let Some(rest) = row.strip_prefix('[') else {
        return row;
    };
    let label = rest.split(']').next().unwrap_or_default();
    if label.contains('.') {
        return row;
    }
    format!("[{tag}{rest}")
}

/// Parse a `DEFAULT>key=value` line.
fn parse_default(line: &str) -> Option<(String, Value)> {
    let (key, value) = line.strip_prefix(DEFAULT_PREFIX)?.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    let value = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .map(|v| Value::Str(v.to_string()))
        .unwrap_or_else(|| Value::from_literal(value));
    Some((key.to_string(), value))
}

#[derive(Debug, Default)]
struct Segments {
    named: Vec<(String, Vec<String>, Bindings)>,
    anonymous: Vec<(String, Vec<String>)>,
}

/// Split one file into segments.
///
/// Anonymous blocks are pushed on a work stack and parsed after the
/// enclosing rows, each into its own generated name.
fn parse_segments(rows: Vec<String>, tag: &str, counter: &mut u32) -> Segments {
    let mut out = Segments::default();
    let mut work: Vec<(Option<String>, Vec<String>)> = Vec::new();
    work.push((None, rows));

    while let Some((block_name, rows)) = work.pop() {
        let anonymous = block_name.is_some();
        let mut name = block_name;
        let mut lines: Vec<String> = Vec::new();
        let mut defaults = Bindings::new();
        let mut block: Option<Vec<String>> = None;
        let mut depth = 0usize;

        for row in rows {
            if row.len() >= 2 && row.starts_with('<') && row.ends_with('>') {
                flush(&mut out, anonymous, name.take(), &mut lines, &mut defaults);
                let prefix = if anonymous { "" } else { tag };
                name = Some(format!("{prefix}{}", &row[1..row.len() - 1]));
                block = None;
                depth = 0;
                continue;
            }

            let body = if block.is_some() {
                row.as_str()
            } else if let Some(rest) = row.strip_prefix('{') {
                block = Some(Vec::new());
                depth = 0;
                rest
            } else {
                if let Some((key, value)) = parse_default(&row) {
                    if anonymous {
                        debug!("default ignored inside anonymous block");
                    } else {
                        defaults.insert(key, value);
                    }
                } else {
                    lines.push(row);
                }
                continue;
            };

            let mut inner = String::new();
            let mut closed_with: Option<&str> = None;
            for (i, c) in body.char_indices() {
                match c {
                    '}' if depth == 0 => {
                        closed_with = Some(&body[i + 1..]);
                        break;
                    }
                    '}' => depth -= 1,
                    '{' => depth += 1,
                    _ => {}
                }
                inner.push(c);
            }

            let Some(sub_rows) = block.as_mut() else {
                continue;
            };
            if !inner.is_empty() {
                sub_rows.push(inner);
            }
            if let Some(suffix) = closed_with {
                if let Some(sub_rows) = block.take() {
                    if !sub_rows.is_empty() {
                        let generated = format!("{ANONYMOUS_PREFIX}{:x}", *counter);
                        *counter += 1;
                        lines.push(format!("[{generated}]{suffix}"));
                        work.push((Some(generated), sub_rows));
                    }
                }
            }
        }

        flush(&mut out, anonymous, name, &mut lines, &mut defaults);
    }

    out
}

fn flush(
    out: &mut Segments,
    anonymous: bool,
    name: Option<String>,
    lines: &mut Vec<String>,
    defaults: &mut Bindings,
) {
    let lines = core::mem::take(lines);
    let defaults = core::mem::take(defaults);
    let Some(name) = name else {
        return;
    };
    if lines.is_empty() {
        return;
    }
    if anonymous && name.starts_with(ANONYMOUS_PREFIX) {
        out.anonymous.push((name, lines));
    } else {
        out.named.push((name, lines, defaults));
    }
}

/// Loads macro files from a directory tree on the host.
#[cfg(any(test, feature = "std"))]
pub struct DirSource {
    root: std::path::PathBuf,
}

#[cfg(any(test, feature = "std"))]
impl DirSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, dir: &std::path::Path, prefix: &str, visit: &mut dyn FnMut(&str, &str)) {
        // Absent or unreadable directories contribute nothing.
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let rel = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, &rel, visit);
            } else if is_script_path(&rel) {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    visit(&rel, &text);
                }
            }
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl ScriptSource for DirSource {
    fn visit_files(&self, visit: &mut dyn FnMut(&str, &str)) {
        self.walk(&self.root, "", visit);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn lines(store: &ScriptStore, name: &str) -> Vec<String> {
        store.graph(name).expect("graph").lines().to_vec()
    }

    #[test]
    fn test_segments_and_comments() {
        let files = [(
            "daily.m",
            "ignored before marker\n\
             <loop>\n\
             -- comment\n\
             # comment\n\
             \n\
             A : 0.1\n\
             \tB|UP:0.2\n\
             <empty>\n\
             <second>\n\
             X\n",
        )];
        let store = ScriptStore::load(&files);
        assert_eq!(store.len(), 2);
        assert_eq!(lines(&store, "daily.loop"), ["A:0.1", "B|UP:0.2"]);
        assert_eq!(lines(&store, "daily.second"), ["X"]);
        assert!(store.get("daily.empty").is_none());
    }

    #[test]
    fn test_file_tag_from_nested_path() {
        let files = [("sub/dir/file.M", "<m>\nA\n[t]\n[other.x]*2\n")];
        let store = ScriptStore::load(&files);
        assert_eq!(
            lines(&store, "sub.dir.file.m"),
            ["A", "[sub.dir.file.t]", "[other.x]*2"]
        );
    }

    #[test]
    fn test_label_qualification_ignores_suffix_dots() {
        let files = [("foo.m", "<a>\n[t]*1.5\n")];
        let store = ScriptStore::load(&files);
        assert_eq!(lines(&store, "foo.a"), ["[foo.t]*1.5"]);
    }

    #[test]
    fn test_anonymous_block_with_suffix() {
        let files = [("foo.m", "<a>\nX\n{\nB:0.1\nC\n}*3\nY\n")];
        let store = ScriptStore::load(&files);
        let main = lines(&store, "foo.a");
        assert_eq!(main.len(), 3);
        assert_eq!(main[0], "X");
        assert_eq!(main[2], "Y");
        let jump = &main[1];
        let label = jump
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix("]*3"))
            .expect("jump line");
        assert_eq!(lines(&store, label), ["B:0.1", "C"]);
        // Generated names stay out of the named map.
        assert!(!store.contains(label));
    }

    #[test]
    fn test_single_line_and_nested_blocks() {
        let files = [("n.m", "<a>\n{A}*2\n{\nB\n{\nC\n}*3\n}\n")];
        let store = ScriptStore::load(&files);
        let main = lines(&store, "n.a");
        assert_eq!(main.len(), 2);

        let first = main[0].strip_prefix('[').and_then(|r| r.strip_suffix("]*2")).unwrap();
        assert_eq!(lines(&store, first), ["A"]);

        let outer = main[1].strip_prefix('[').and_then(|r| r.strip_suffix(']')).unwrap();
        let outer_lines = lines(&store, outer);
        assert_eq!(outer_lines.len(), 2);
        assert_eq!(outer_lines[0], "B");
        let inner = outer_lines[1]
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix("]*3"))
            .unwrap();
        assert_eq!(lines(&store, inner), ["C"]);
    }

    #[test]
    fn test_empty_block_produces_nothing() {
        let files = [("e.m", "<a>\nA\n{}\n{\n}*2\nB\n")];
        let store = ScriptStore::load(&files);
        assert_eq!(lines(&store, "e.a"), ["A", "B"]);
    }

    #[test]
    fn test_defaults_are_collected() {
        let files = [("p.m", "<a>\nDEFAULT>count=3\nDEFAULT>mode='fast'\nDEFAULT>on=TRUE\nA\n")];
        let store = ScriptStore::load(&files);
        let script = store.get("p.a").unwrap();
        assert_eq!(script.graph().lines(), ["A"]);
        assert_eq!(script.defaults().get("count"), Some(&Value::Number(3.0)));
        assert_eq!(script.defaults().get("mode"), Some(&Value::Str("fast".into())));
        assert_eq!(script.defaults().get("on"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_non_script_paths_skipped() {
        let files = [
            ("notes.txt", "<a>\nA\n"),
            (".hidden/x.m", "<a>\nA\n"),
            ("ok.m", "<a>\nA\n"),
        ];
        let store = ScriptStore::load(&files);
        assert_eq!(store.names().collect::<Vec<_>>(), ["ok.a"]);
    }

    #[test]
    fn test_reset_reloads() {
        let mut store = ScriptStore::load(&[("a.m", "<x>\nA\n")]);
        assert!(store.contains("a.x"));
        store.reset(&[("b.m", "<y>\nB\n")]);
        assert!(!store.contains("a.x"));
        assert!(store.contains("b.y"));
    }

    #[test]
    fn test_dir_source() {
        let root = std::env::temp_dir().join(format!(
            "macro-engine-store-{}-{}",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("top.m"), "<a>\nA\n").unwrap();
        std::fs::write(root.join("sub/inner.M"), "<b>\nB\n").unwrap();
        std::fs::write(root.join(".git/skip.m"), "<c>\nC\n").unwrap();
        std::fs::write(root.join("readme.md"), "<d>\nD\n").unwrap();

        let store = ScriptStore::load(&DirSource::new(&root));
        assert_eq!(store.names().collect::<Vec<_>>(), ["sub.inner.b", "top.a"]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = ScriptStore::load(&DirSource::new("/nonexistent/macro-engine/dir"));
        assert!(store.is_empty());
    }
}

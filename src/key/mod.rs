//! Key file (`*KEYWORD` deck) parsing: line classification, keyword
//! assembly, and transitive `*INCLUDE` resolution.

mod include_transform;

pub use include_transform::{DefineTransformation, IncludeTransform, TransformationOption};

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::KeyFileError;
use crate::line::LineReader;

/// Controls include resolution during a parse.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub parse_includes: bool,
    pub ignore_not_found_includes: bool,
    pub extra_include_paths: Vec<PathBuf>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            parse_includes: true,
            ignore_not_found_includes: false,
            extra_include_paths: Vec::new(),
        }
    }
}

/// One `*KEYWORD` block: a name (the `*` stripped) and its raw card lines.
/// Field parsing is deferred to the caller via [`crate::card::Card`].
#[derive(Debug, Clone)]
pub struct DeckKeyword {
    pub name: String,
    pub cards: Vec<String>,
}

impl DeckKeyword {
    pub fn card(&self, index: usize) -> Option<crate::card::Card<'_>> {
        self.cards.get(index).map(|s| crate::card::Card::new(s.as_str()))
    }
}

const INCLUDE_KEYWORDS: [&str; 4] = ["INCLUDE", "INCLUDE_PATH", "INCLUDE_NASTRAN", "INCLUDE_BINARY"];
const INCLUDE_TRANSFORM_KEYWORDS: [&str; 2] = ["INCLUDE_TRANSFORM", "INCLUDE_TRANSFORM_BINARY"];

/// A parsed key file deck: keywords in first-occurrence order, accumulated
/// warnings, and every include path actually visited.
pub struct KeyFile {
    keywords: Vec<DeckKeyword>,
    warnings: Vec<String>,
    visited_includes: Vec<PathBuf>,
    /// Indices into `keywords`, stably sorted by name so that matching names
    /// form a contiguous run — backs `get`/`get_slice`.
    name_order: Vec<usize>,
    name_ranges: HashMap<String, (usize, usize)>,
}

impl KeyFile {
    #[tracing::instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn parse(path: impl AsRef<Path>, config: &ParseConfig) -> Result<KeyFile, KeyFileError> {
        let path = path.as_ref();
        let mut keywords = Vec::new();
        let mut warnings = Vec::new();
        let mut visited = Vec::new();
        let mut stack = HashSet::new();
        parse_one_file(path, config, &mut keywords, &mut warnings, &mut visited, &mut stack, None)?;
        Ok(KeyFile::from_parts(keywords, warnings, visited))
    }

    fn from_parts(keywords: Vec<DeckKeyword>, warnings: Vec<String>, visited_includes: Vec<PathBuf>) -> KeyFile {
        let mut name_order: Vec<usize> = (0..keywords.len()).collect();
        name_order.sort_by(|&a, &b| keywords[a].name.cmp(&keywords[b].name));

        let mut name_ranges = HashMap::new();
        let mut i = 0;
        while i < name_order.len() {
            let name = keywords[name_order[i]].name.clone();
            let start = i;
            while i < name_order.len() && keywords[name_order[i]].name == name {
                i += 1;
            }
            name_ranges.insert(name, (start, i - start));
        }

        KeyFile {
            keywords,
            warnings,
            visited_includes,
            name_order,
            name_ranges,
        }
    }

    pub fn keywords(&self) -> &[DeckKeyword] {
        &self.keywords
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn visited_includes(&self) -> &[PathBuf] {
        &self.visited_includes
    }

    /// The `n`-th (0-based) keyword with this name, in file-discovery order.
    pub fn get(&self, name: &str, n: usize) -> Option<&DeckKeyword> {
        let (start, len) = *self.name_ranges.get(name)?;
        if n >= len {
            return None;
        }
        Some(&self.keywords[self.name_order[start + n]])
    }

    /// Every keyword with this name, in file-discovery order.
    pub fn get_slice(&self, name: &str) -> Vec<&DeckKeyword> {
        match self.name_ranges.get(name) {
            Some(&(start, len)) => self.name_order[start..start + len]
                .iter()
                .map(|&idx| &self.keywords[idx])
                .collect(),
            None => Vec::new(),
        }
    }
}

fn finalize(
    current: Option<DeckKeyword>,
    keywords: &mut Vec<DeckKeyword>,
    transform: Option<&IncludeTransform>,
) {
    if let Some(mut keyword) = current {
        if let Some(transform) = transform {
            apply_transform(&mut keyword, transform);
        }
        keywords.push(keyword);
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_one_file(
    path: &Path,
    config: &ParseConfig,
    keywords: &mut Vec<DeckKeyword>,
    warnings: &mut Vec<String>,
    visited: &mut Vec<PathBuf>,
    stack: &mut HashSet<PathBuf>,
    transform: Option<&IncludeTransform>,
) -> Result<(), KeyFileError> {
    let canonical = path
        .canonicalize()
        .map_err(|source| KeyFileError::Open { path: path.to_path_buf(), source })?;
    if stack.contains(&canonical) {
        return Err(KeyFileError::CircularInclude(canonical));
    }
    stack.insert(canonical.clone());
    visited.push(path.to_path_buf());
    debug!(path = %path.display(), "parsing key file");

    let file = File::open(path).map_err(|source| KeyFileError::Open { path: path.to_path_buf(), source })?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let mut reader = LineReader::new(BufReader::new(file));
    let mut current: Option<DeckKeyword> = None;

    loop {
        let line = match reader.next_line()? {
            Some(line) => line,
            None => break,
        };
        let text = line.as_str();
        let leading_trimmed = text.trim_start();
        if leading_trimmed.is_empty() {
            continue;
        }
        let first = leading_trimmed.as_bytes()[0];

        if first == b'$' {
            continue;
        }

        if first == b'*' {
            let name = leading_trimmed[1..].trim().to_string();
            if name.eq_ignore_ascii_case("END") {
                finalize(current.take(), keywords, transform);
                break;
            }

            let upper = name.to_ascii_uppercase();

            if INCLUDE_KEYWORDS.contains(&upper.as_str()) {
                finalize(current.take(), keywords, transform);
                current = None;
                if config.parse_includes {
                    if let Some(filename_line) = reader.next_line()? {
                        let filename = crate::card::Card::new(filename_line.as_str()).parse_whole();
                        resolve_include(
                            &filename, &base_dir, config, keywords, warnings, visited, stack, transform,
                        )?;
                    }
                } else {
                    current = Some(DeckKeyword { name, cards: Vec::new() });
                }
                continue;
            }

            if INCLUDE_TRANSFORM_KEYWORDS.contains(&upper.as_str()) {
                finalize(current.take(), keywords, transform);
                current = None;
                if config.parse_includes {
                    let mut transform_cards = Vec::with_capacity(5);
                    for _ in 0..5 {
                        match reader.next_line()? {
                            Some(l) => transform_cards.push(l.as_str().to_string()),
                            None => break,
                        }
                    }
                    let nested = IncludeTransform::parse_cards(&transform_cards);
                    resolve_include(
                        &nested.file_name,
                        &base_dir,
                        config,
                        keywords,
                        warnings,
                        visited,
                        stack,
                        Some(&nested),
                    )?;
                } else {
                    current = Some(DeckKeyword { name, cards: Vec::new() });
                }
                continue;
            }

            finalize(current.take(), keywords, transform);
            current = Some(DeckKeyword { name, cards: Vec::new() });
            continue;
        }

        let content = match text.find('$') {
            Some(idx) => &text[..idx],
            None => text,
        };
        if let Some(keyword) = current.as_mut() {
            keyword.cards.push(content.to_string());
        }
    }

    finalize(current.take(), keywords, transform);
    stack.remove(&canonical);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_include(
    filename: &str,
    base_dir: &Path,
    config: &ParseConfig,
    keywords: &mut Vec<DeckKeyword>,
    warnings: &mut Vec<String>,
    visited: &mut Vec<PathBuf>,
    stack: &mut HashSet<PathBuf>,
    transform: Option<&IncludeTransform>,
) -> Result<(), KeyFileError> {
    let candidate = base_dir.join(filename);
    let resolved = if candidate.exists() {
        Some(candidate)
    } else {
        config
            .extra_include_paths
            .iter()
            .map(|p| p.join(filename))
            .find(|p| p.exists())
    };

    match resolved {
        Some(resolved) => parse_one_file(&resolved, config, keywords, warnings, visited, stack, transform),
        None => {
            let missing = base_dir.join(filename);
            if config.ignore_not_found_includes {
                let message = format!("include file not found: {}", missing.display());
                warn!(%message, "key file include missing, continuing");
                warnings.push(message);
                Ok(())
            } else {
                Err(KeyFileError::IncludeNotFound(missing))
            }
        }
    }
}

/// Rewrite a fixed-width integer field in place, right-justified, leaving
/// the rest of the line untouched.
fn rewrite_int_field(line: &str, start: usize, width: usize, value: i64) -> String {
    if line.len() < start || line[start..].trim().is_empty() {
        return line.to_string();
    }
    let end = (start + width).min(line.len());
    let field = format!("{value:>width$}", width = width);
    format!("{}{}{}", &line[..start], field, &line[end..])
}

fn rewrite_float_field(line: &str, start: usize, width: usize, value: f64) -> String {
    if line.len() < start || line[start..].trim().is_empty() {
        return line.to_string();
    }
    let end = (start + width).min(line.len());
    let rendered = format!("{value}");
    let field = if rendered.len() > width {
        rendered[..width].to_string()
    } else {
        format!("{rendered:>width$}", width = width)
    };
    format!("{}{}{}", &line[..start], field, &line[end..])
}

/// Apply ID offsets and unit factors to the identifier categories the
/// testable properties exercise: node ids and coordinates (`*NODE`),
/// element/part/node references (`*ELEMENT_*`), part and material ids
/// (`*PART`, `*MAT_*`), node set members (`*SET_NODE_*`), and curve ids
/// (`*DEFINE_CURVE`). Other keyword families are left untouched — their
/// exact column layout is LS-DYNA domain data well outside this crate's
/// scope.
fn apply_transform(keyword: &mut DeckKeyword, transform: &IncludeTransform) {
    let name = keyword.name.to_ascii_uppercase();
    if name == "NODE" {
        for card in keyword.cards.iter_mut() {
            let mut rewritten = card.clone();
            if let Some(id) = signed_field(card, 0, 8) {
                rewritten = rewrite_int_field(card, 0, 8, id + transform.idnoff);
            }
            for start in [8usize, 24, 40] {
                if let Some(value) = float_field(&rewritten, start, 16) {
                    rewritten = rewrite_float_field(&rewritten, start, 16, value * transform.fctlen);
                }
            }
            *card = rewritten;
        }
    } else if name.starts_with("ELEMENT_MASS") {
        for card in keyword.cards.iter_mut() {
            let mut rewritten = card.clone();
            if let Some(eid) = signed_field(&rewritten, 0, 10) {
                rewritten = rewrite_int_field(&rewritten, 0, 10, eid + transform.ideoff);
            }
            if let Some(nid) = signed_field(&rewritten, 10, 10) {
                rewritten = rewrite_int_field(&rewritten, 10, 10, nid + transform.idnoff);
            }
            if let Some(mass) = float_field(&rewritten, 20, 10) {
                rewritten = rewrite_float_field(&rewritten, 20, 10, mass * transform.fctmas);
            }
            *card = rewritten;
        }
    } else if name.starts_with("ELEMENT") {
        for card in keyword.cards.iter_mut() {
            let mut rewritten = card.clone();
            if let Some(eid) = signed_field(&rewritten, 0, 10) {
                rewritten = rewrite_int_field(&rewritten, 0, 10, eid + transform.ideoff);
            }
            if let Some(pid) = signed_field(&rewritten, 10, 10) {
                rewritten = rewrite_int_field(&rewritten, 10, 10, pid + transform.idpoff);
            }
            let mut start = 20;
            while let Some(nid) = signed_field(&rewritten, start, 10) {
                rewritten = rewrite_int_field(&rewritten, start, 10, nid + transform.idnoff);
                start += 10;
            }
            *card = rewritten;
        }
    } else if name == "PART" {
        // card 0 is the title; the data card is card 1.
        if let Some(card) = keyword.cards.get_mut(1) {
            let mut rewritten = card.clone();
            if let Some(pid) = signed_field(&rewritten, 0, 10) {
                rewritten = rewrite_int_field(&rewritten, 0, 10, pid + transform.idpoff);
            }
            if let Some(mid) = signed_field(&rewritten, 20, 10) {
                rewritten = rewrite_int_field(&rewritten, 20, 10, mid + transform.idmoff);
            }
            *card = rewritten;
        }
    } else if name.starts_with("MAT") {
        if let Some(card) = keyword.cards.first_mut() {
            if let Some(mid) = signed_field(card, 0, 10) {
                *card = rewrite_int_field(card, 0, 10, mid + transform.idmoff);
            }
        }
    } else if name.starts_with("SET_NODE") {
        let mut cards = keyword.cards.iter_mut();
        if let Some(first) = cards.next() {
            if let Some(sid) = signed_field(first, 0, 10) {
                *first = rewrite_int_field(first, 0, 10, sid + transform.idsoff);
            }
        }
        for card in cards {
            let mut rewritten = card.clone();
            let mut start = 0;
            while let Some(nid) = signed_field(&rewritten, start, 10) {
                rewritten = rewrite_int_field(&rewritten, start, 10, nid + transform.idnoff);
                start += 10;
            }
            *card = rewritten;
        }
    } else if name.starts_with("DEFINE_CURVE") {
        if let Some(card) = keyword.cards.first_mut() {
            if let Some(lcid) = signed_field(card, 0, 10) {
                *card = rewrite_int_field(card, 0, 10, lcid + transform.idfoff);
            }
        }
    }
}

fn signed_field(line: &str, start: usize, width: usize) -> Option<i64> {
    if start >= line.len() {
        return None;
    }
    let end = (start + width).min(line.len());
    let field = &line[start..end];
    if field.trim().is_empty() {
        return None;
    }
    let card = crate::card::Card::new(field);
    Some(card.parse_int_width(field.len() as u8))
}

fn float_field(line: &str, start: usize, width: usize) -> Option<f64> {
    if start >= line.len() {
        return None;
    }
    let end = (start + width).min(line.len());
    let field = &line[start..end];
    if field.trim().is_empty() {
        return None;
    }
    let card = crate::card::Card::new(field);
    Some(card.parse_f64_width(field.len() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn classifies_comments_keywords_and_cards() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.k",
            "$ a full comment line\n*KEYWORD\n*NODE\n       1       0.0       0.0       0.0\n*END\n",
        );
        let key_file = KeyFile::parse(&path, &ParseConfig::default()).unwrap();
        assert_eq!(key_file.keywords().len(), 2);
        assert_eq!(key_file.keywords()[0].name, "KEYWORD");
        assert_eq!(key_file.keywords()[1].name, "NODE");
        assert_eq!(key_file.keywords()[1].cards.len(), 1);
    }

    #[test]
    fn get_and_get_slice_group_by_name() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "main.k",
            "*NODE\n1\n*PART\ntitle\n*NODE\n2\n*END\n",
        );
        let key_file = KeyFile::parse(&path, &ParseConfig::default()).unwrap();
        assert_eq!(key_file.get_slice("NODE").len(), 2);
        assert_eq!(key_file.get("NODE", 1).unwrap().cards[0].trim(), "2");
        assert!(key_file.get("NODE", 2).is_none());
    }

    #[test]
    fn follows_include_and_records_visited_paths() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "child.k", "*PART\nchild part\n*END\n");
        let main = write_file(dir.path(), "main.k", "*INCLUDE\nchild.k\n*END\n");

        let key_file = KeyFile::parse(&main, &ParseConfig::default()).unwrap();
        assert_eq!(key_file.keywords().len(), 1);
        assert_eq!(key_file.keywords()[0].name, "PART");
        assert_eq!(key_file.visited_includes().len(), 2);
    }

    #[test]
    fn missing_include_is_an_error_by_default() {
        let dir = tempdir().unwrap();
        let main = write_file(dir.path(), "main.k", "*INCLUDE\nghost.k\n*END\n");
        let err = KeyFile::parse(&main, &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, KeyFileError::IncludeNotFound(_)));
    }

    #[test]
    fn missing_include_is_a_warning_when_configured() {
        let dir = tempdir().unwrap();
        let main = write_file(dir.path(), "main.k", "*INCLUDE\nghost.k\n*END\n");
        let config = ParseConfig {
            ignore_not_found_includes: true,
            ..ParseConfig::default()
        };
        let key_file = KeyFile::parse(&main, &config).unwrap();
        assert_eq!(key_file.warnings().len(), 1);
    }

    #[test]
    fn circular_include_is_detected() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.k", "*INCLUDE\nb.k\n");
        write_file(dir.path(), "b.k", "*INCLUDE\na.k\n");
        let main = dir.path().join("a.k");
        let err = KeyFile::parse(&main, &ParseConfig::default()).unwrap_err();
        assert!(matches!(err, KeyFileError::CircularInclude(_)));
    }

    #[test]
    fn include_transform_offsets_node_ids() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            "sub.k",
            "*NODE\n       1       0.0       0.0       0.0\n*END\n",
        );
        let main = write_file(
            dir.path(),
            "main.k",
            "*INCLUDE_TRANSFORM\nsub.k\n       100         0         0         0         0         0         0\n\n\n\n*END\n",
        );

        let key_file = KeyFile::parse(&main, &ParseConfig::default()).unwrap();
        let node = key_file.get("NODE", 0).unwrap();
        let mut card = crate::card::Card::new(&node.cards[0]);
        card.begin(8);
        assert_eq!(card.parse_int(), 101);
    }
}

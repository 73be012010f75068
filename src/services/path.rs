//! Path helpers shared by SCM discovery and the build providers.

use camino::{Utf8Path, Utf8PathBuf};

/// Join `file` onto `base`
pub fn path_append(base: &Utf8Path, file: &str) -> Utf8PathBuf {
    base.join(file)
}

/// Whether `file` exists inside `dir`
pub fn relative_exists(dir: &Utf8Path, file: &str) -> bool {
    !file.is_empty() && dir.join(file).exists()
}

/// Case-insensitive suffix test on the textual path. Matches extensions (`.o`)
/// as well as whole names (`compile_commands.json`).
pub fn has_suffix(path: &Utf8Path, suffix: &str) -> bool {
    let path = path.as_str();
    path.len() >= suffix.len()
        && path.is_char_boundary(path.len() - suffix.len())
        && path[path.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Last path component, or an empty string for roots and empty paths
pub fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or("")
}

/// Walk from `start` towards the filesystem root looking for a directory that
/// contains `marker`.
///
/// `ceiling`, when given, is the last directory examined. Both paths are
/// canonicalized first so relative starts and symlinked temp dirs behave.
pub fn find_marker_root(
    start: &Utf8Path,
    marker: &str,
    ceiling: Option<&Utf8Path>,
) -> Option<Utf8PathBuf> {
    let start = match start.canonicalize_utf8() {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!("Cannot resolve {}: {}", start, e);
            return None;
        }
    };
    let ceiling = ceiling.and_then(|c| c.canonicalize_utf8().ok());

    for dir in start.ancestors() {
        if dir.join(marker).exists() {
            return Some(dir.to_path_buf());
        }
        if ceiling.as_deref() == Some(dir) {
            break;
        }
    }
    None
}

/// `path[:line[:column]]` as accepted by editor open requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOptions {
    pub path: String,
    pub line: u32,
    pub character: u32,
}

impl PathOptions {
    /// Parse `file:line:col`. Missing or malformed numbers read as 0.
    pub fn parse(input: &str) -> Self {
        let mut parts = input.splitn(3, ':');
        let path = parts.next().unwrap_or_default().to_string();
        let line = parts.next().map(leading_number).unwrap_or(0);
        let character = parts.next().map(leading_number).unwrap_or(0);

        Self {
            path,
            line,
            character,
        }
    }
}

fn leading_number(text: &str) -> u32 {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

//! `git status --porcelain` parser.
//!
//! Each line is `XY <path>` where `X` is the index column and `Y` the worktree column.
//! Paths with unusual characters are C-quoted by git (`"a b.txt"`, `"caf\303\251"`);
//! renames are printed as `old -> new`.

use crate::models::{StatusCode, StatusRecord};
use crate::services::exe::ShellArg;
use camino::Utf8Path;

/// Map the two porcelain columns to a change kind and staged flag.
///
/// `A`, `R`, `M`, `D` are tried in that order. A code found in either column selects
/// the base kind; found in the index column it selects the staged variant instead.
pub fn status_code(index: char, worktree: char) -> (StatusCode, bool) {
    if index == '?' && worktree == '?' {
        return (StatusCode::Untracked, false);
    }

    let table = [
        ('A', StatusCode::Added, StatusCode::AddedStaged),
        ('R', StatusCode::Renamed, StatusCode::RenamedStaged),
        ('M', StatusCode::Modified, StatusCode::ModifiedStaged),
        ('D', StatusCode::Deleted, StatusCode::DeletedStaged),
    ];

    for (marker, unstaged, staged) in table {
        if index == marker {
            return (staged, true);
        }
        if worktree == marker {
            return (unstaged, false);
        }
    }

    (StatusCode::Unknown, false)
}

/// Parse one porcelain line. Malformed lines yield `None`.
pub fn parse_line(line: &str, root: &Utf8Path) -> Option<StatusRecord> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut chars = line.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;
    if chars.next()? != ' ' {
        return None;
    }
    let rest = chars.as_str();
    if rest.is_empty() {
        return None;
    }

    let (change, staged) = status_code(index, worktree);

    let (orig, target) = match change {
        StatusCode::Renamed | StatusCode::RenamedStaged => match split_rename(rest) {
            Some((orig, target)) => (Some(orig), target),
            None => (None, rest),
        },
        _ => (None, rest),
    };

    let unescaped = unquote_path(target);
    let path = match ShellArg::new(unescaped.clone()) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!("Skipping status line {:?}: {}", line, e);
            return None;
        }
    };

    Some(StatusRecord {
        fullpath: root.join(&unescaped),
        path,
        unescaped,
        orig_path: orig.map(unquote_path),
        change,
        staged,
    })
}

/// Parse full porcelain output, keeping git's ordering and skipping bad lines
pub fn parse_porcelain(output: &str, root: &Utf8Path) -> Vec<StatusRecord> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let record = parse_line(line, root);
            if record.is_none() {
                tracing::debug!("Ignoring malformed status line: {:?}", line);
            }
            record
        })
        .collect()
}

fn split_rename(rest: &str) -> Option<(&str, &str)> {
    // a quoted source may itself contain " -> ", so skip past its closing quote first
    let search_from = if rest.starts_with('"') {
        closing_quote(rest)? + 1
    } else {
        0
    };
    let arrow = rest[search_from..].find(" -> ")? + search_from;
    Some((&rest[..arrow], &rest[arrow + 4..]))
}

fn closing_quote(quoted: &str) -> Option<usize> {
    let bytes = quoted.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Undo git's C-style path quoting. Unquoted input is returned as is.
pub fn unquote_path(raw: &str) -> String {
    let inner = match raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) if raw.len() >= 2 => inner,
        _ => return raw.to_string(),
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes().peekable();

    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }

        let Some(escape) = iter.next() else {
            bytes.push(b'\\');
            break;
        };

        match escape {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b't' => bytes.push(b'\t'),
            b'n' => bytes.push(b'\n'),
            b'v' => bytes.push(0x0b),
            b'f' => bytes.push(0x0c),
            b'r' => bytes.push(b'\r'),
            b'0'..=b'7' => {
                let mut value = u32::from(escape - b'0');
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            iter.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            other => bytes.push(other),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

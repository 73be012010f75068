use crate::services::exe::ShellArg;
use camino::Utf8PathBuf;
use serde::Serialize;
use std::fmt;

/// Kind of change git reports for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusCode {
    /// Clean path, only returned by single-file queries
    None,
    Added,
    Deleted,
    Modified,
    Renamed,
    Untracked,
    AddedStaged,
    DeletedStaged,
    ModifiedStaged,
    RenamedStaged,
    Unknown,
}

impl StatusCode {
    pub fn is_staged(self) -> bool {
        matches!(
            self,
            StatusCode::AddedStaged
                | StatusCode::DeletedStaged
                | StatusCode::ModifiedStaged
                | StatusCode::RenamedStaged
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::None => "clean",
            StatusCode::Added => "added",
            StatusCode::Deleted => "deleted",
            StatusCode::Modified => "modified",
            StatusCode::Renamed => "renamed",
            StatusCode::Untracked => "untracked",
            StatusCode::AddedStaged => "added (staged)",
            StatusCode::DeletedStaged => "deleted (staged)",
            StatusCode::ModifiedStaged => "modified (staged)",
            StatusCode::RenamedStaged => "renamed (staged)",
            StatusCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One line of `git status --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Repository-relative path, shell-safe for reuse in further commands
    pub path: ShellArg,
    pub fullpath: Utf8PathBuf,
    /// Display form with git's C-style quoting removed
    pub unescaped: String,
    /// Source path of a rename
    pub orig_path: Option<String>,
    pub change: StatusCode,
    pub staged: bool,
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.orig_path {
            Some(orig) => write!(f, "{:<18} {} -> {}", self.change, orig, self.unescaped),
            None => write!(f, "{:<18} {}", self.change, self.unescaped),
        }
    }
}

use std::path::Path;

use tracing::debug;

use crate::model::VcsInfo;

/// Determine clone information for `path` by probing the filesystem.
///
/// Walks up the directory tree for a `.git` directory and reads `HEAD` and
/// `config` directly; no external tool is invoked. Anything that cannot be
/// determined degrades to the unknown record — this is never fatal.
pub fn clone_info(path: &Path) -> VcsInfo {
    let start = if path.is_file() { path.parent() } else { Some(path) };

    let mut dir = start;
    while let Some(current) = dir {
        let git_dir = current.join(".git");
        if git_dir.is_dir() {
            return read_git_info(&git_dir);
        }
        dir = current.parent();
    }

    debug!(path = %path.display(), "no VCS checkout found");
    VcsInfo::default()
}

fn read_git_info(git_dir: &Path) -> VcsInfo {
    VcsInfo::new(
        "Git",
        read_origin_url(git_dir).unwrap_or_default(),
        read_head_revision(git_dir).unwrap_or_default(),
    )
}

/// Resolve HEAD to a commit hash, following one level of symbolic ref.
fn read_head_revision(git_dir: &Path) -> Option<String> {
    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    if let Some(reference) = head.strip_prefix("ref: ") {
        let resolved = std::fs::read_to_string(git_dir.join(reference)).ok()?;
        return Some(resolved.trim().to_string());
    }

    // Detached HEAD holds the hash directly.
    Some(head.to_string())
}

/// Extract the "origin" remote URL from `.git/config` without a git binary.
fn read_origin_url(git_dir: &Path) -> Option<String> {
    let config = std::fs::read_to_string(git_dir.join("config")).ok()?;

    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if in_origin {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Some(value.trim().to_string());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_git_checkout(dir: &Path) {
        let git = dir.join(".git");
        fs::create_dir_all(git.join("refs").join("heads")).unwrap();
        fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(
            git.join("refs").join("heads").join("main"),
            "0123456789abcdef0123456789abcdef01234567\n",
        )
        .unwrap();
        fs::write(
            git.join("config"),
            "[core]\n\tbare = false\n[remote \"origin\"]\n\turl = https://example.com/repo.git\n\tfetch = +refs/heads/*:refs/remotes/origin/*\n",
        )
        .unwrap();
    }

    #[test]
    fn test_reads_git_checkout() {
        let dir = TempDir::new().unwrap();
        fake_git_checkout(dir.path());

        let info = clone_info(dir.path());
        assert_eq!(info.vcs_type, "Git");
        assert_eq!(info.url, "https://example.com/repo.git");
        assert_eq!(info.revision, "0123456789abcdef0123456789abcdef01234567");
    }

    #[test]
    fn test_walks_up_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        fake_git_checkout(dir.path());
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let info = clone_info(&nested);
        assert_eq!(info.vcs_type, "Git");
    }

    #[test]
    fn test_degrades_to_unknown() {
        let dir = TempDir::new().unwrap();
        assert_eq!(clone_info(dir.path()), VcsInfo::default());
    }
}

//! Identifier classification and resolution.
//!
//! [`classify`] is a pure pattern match with no I/O. The `resolve_*`
//! functions do the filesystem work: locating a workstream's markdown
//! file, matching a tracker short-id against workstream frontmatter, or
//! looking an issue id up in an NDJSON index. Issue resolution is the
//! one place this module does anything security-sensitive: an index
//! entry is only trusted once its recorded path is confirmed to lie
//! within the issues directory. A violation aborts resolution outright,
//! with no filesystem fallback for a path that tried to escape.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("index entry for {id} escapes the issues directory: {path}")]
    PathEscape { id: String, path: String },

    #[error("malformed frontmatter in {0}")]
    MalformedFrontmatter(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Workstream,
    Tracker,
    FixWorkstream,
    Issue,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ResolvedId {
    pub kind: IdKind,
    pub path: Option<PathBuf>,
    pub title: Option<String>,
    pub status: Option<String>,
}

fn workstream_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}-\d{3}-\d{2}|\d{2}-[A-Z]\d{3}-\d{4})$").unwrap())
}

fn tracker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2,8}-[0-9a-f]{6,12}$").unwrap())
}

fn fix_workstream_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^fix-\d{2}-\d{3}-\d{2}$").unwrap())
}

fn issue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{2,6}-\d{1,6}$").unwrap())
}

/// Classify an id by pattern alone. Pure: same input always yields the
/// same output, and nothing here touches the filesystem.
pub fn classify(id: &str) -> IdKind {
    if fix_workstream_re().is_match(id) {
        IdKind::FixWorkstream
    } else if workstream_re().is_match(id) {
        IdKind::Workstream
    } else if tracker_re().is_match(id) {
        IdKind::Tracker
    } else if issue_re().is_match(id) {
        IdKind::Issue
    } else {
        IdKind::Unknown
    }
}

/// Pull `title`/`status` out of a minimal YAML frontmatter block
/// (`---\nkey: value\n---`). This is a small, known-shape scan rather
/// than a full YAML parse, since workstream/issue files only ever carry
/// a handful of scalar fields here.
fn parse_frontmatter(contents: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut lines = contents.lines();
    if lines.next() != Some("---") {
        return fields;
    }
    for line in lines {
        if line.trim() == "---" {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }
    fields
}

/// Resolve a workstream id by opening `<dir>/<id>.md` directly.
pub fn resolve_workstream(dir: &Path, id: &str) -> Result<ResolvedId, ResolverError> {
    let path = dir.join(format!("{id}.md"));
    let contents = fs::read_to_string(&path)
        .map_err(|_| ResolverError::NotFound(format!("workstream {id}")))?;
    let fields = parse_frontmatter(&contents);
    Ok(ResolvedId {
        kind: IdKind::Workstream,
        path: Some(path),
        title: fields.get("title").cloned(),
        status: fields.get("status").cloned(),
    })
}

/// Resolve a tracker short-id by scanning every workstream file's
/// frontmatter for a matching `beads_id`.
pub fn resolve_tracker(dir: &Path, short_id: &str) -> Result<ResolvedId, ResolverError> {
    let entries = fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let contents = fs::read_to_string(&path)?;
        let fields = parse_frontmatter(&contents);
        if fields.get("beads_id").map(|s| s.as_str()) == Some(short_id) {
            return Ok(ResolvedId {
                kind: IdKind::Tracker,
                path: Some(path),
                title: fields.get("title").cloned(),
                status: fields.get("status").cloned(),
            });
        }
    }
    Err(ResolverError::NotFound(format!("tracker id {short_id}")))
}

#[derive(Debug, Clone, serde::Deserialize)]
struct IssueIndexEntry {
    issue_id: String,
    title: String,
    status: String,
    file: String,
}

/// Resolve an issue id, trying the NDJSON index first and falling back
/// to a direct filesystem lookup only on a plain miss. An index hit
/// whose recorded path escapes `issues_dir` fails immediately with
/// [`ResolverError::PathEscape`] and is never retried against the
/// filesystem.
pub fn resolve_issue(
    issues_dir: &Path,
    index_path: Option<&Path>,
    id: &str,
) -> Result<ResolvedId, ResolverError> {
    if let Some(index_path) = index_path {
        if let Some(entry) = find_in_index(index_path, id)? {
            let grandparent = index_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(issues_dir);
            let candidate = grandparent.join(&entry.file);
            let canonical_issues_dir = issues_dir.canonicalize().unwrap_or_else(|_| issues_dir.to_path_buf());
            let canonical_candidate = candidate
                .canonicalize()
                .unwrap_or_else(|_| candidate.clone());

            let mut root_with_sep = canonical_issues_dir.as_os_str().to_os_string();
            root_with_sep.push(std::path::MAIN_SEPARATOR.to_string());
            let candidate_str = canonical_candidate.as_os_str();

            if !candidate_str.to_string_lossy().starts_with(&*root_with_sep.to_string_lossy())
                && canonical_candidate != canonical_issues_dir
            {
                return Err(ResolverError::PathEscape {
                    id: id.to_string(),
                    path: candidate.display().to_string(),
                });
            }

            return Ok(ResolvedId {
                kind: IdKind::Issue,
                path: Some(candidate),
                title: Some(entry.title),
                status: Some(entry.status),
            });
        }
    }

    let path = issues_dir.join(format!("{id}.md"));
    let contents = fs::read_to_string(&path)
        .map_err(|_| ResolverError::NotFound(format!("issue {id}")))?;
    let fields = parse_frontmatter(&contents);
    Ok(ResolvedId {
        kind: IdKind::Issue,
        path: Some(path),
        title: fields.get("title").cloned(),
        status: fields.get("status").cloned(),
    })
}

fn find_in_index(index_path: &Path, id: &str) -> Result<Option<IssueIndexEntry>, ResolverError> {
    let contents = match fs::read_to_string(index_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: IssueIndexEntry = serde_json::from_str(line)
            .map_err(|_| ResolverError::MalformedFrontmatter(index_path.to_path_buf()))?;
        if entry.issue_id == id {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_workstream_ids() {
        assert_eq!(classify("07-042-03"), IdKind::Workstream);
        assert_eq!(classify("07-A042-0003"), IdKind::Workstream);
    }

    #[test]
    fn classifies_fix_workstream_before_workstream() {
        assert_eq!(classify("fix-07-042-03"), IdKind::FixWorkstream);
    }

    #[test]
    fn classifies_tracker_ids() {
        assert_eq!(classify("bd-1a2b3c"), IdKind::Tracker);
    }

    #[test]
    fn classifies_issue_ids() {
        assert_eq!(classify("SDP-1234"), IdKind::Issue);
    }

    #[test]
    fn classifies_unknown() {
        assert_eq!(classify("???"), IdKind::Unknown);
    }

    #[test]
    fn classify_is_pure_and_repeatable() {
        for _ in 0..3 {
            assert_eq!(classify("07-042-03"), IdKind::Workstream);
        }
    }

    #[test]
    fn resolves_workstream_from_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("07-042-03.md"),
            "---\ntitle: \"Add retry\"\nstatus: in_progress\n---\nbody",
        )
        .unwrap();
        let resolved = resolve_workstream(dir.path(), "07-042-03").unwrap();
        assert_eq!(resolved.title.as_deref(), Some("Add retry"));
        assert_eq!(resolved.status.as_deref(), Some("in_progress"));
    }

    #[test]
    fn resolve_workstream_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_workstream(dir.path(), "99-999-99").unwrap_err();
        assert!(matches!(err, ResolverError::NotFound(_)));
    }

    #[test]
    fn resolves_tracker_by_scanning_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("07-042-03.md"),
            "---\ntitle: \"Add retry\"\nstatus: done\nbeads_id: bd-1a2b3c\n---\n",
        )
        .unwrap();
        let resolved = resolve_tracker(dir.path(), "bd-1a2b3c").unwrap();
        assert_eq!(resolved.title.as_deref(), Some("Add retry"));
    }

    #[test]
    fn issue_index_hit_resolves_within_bounds() {
        let root = tempfile::tempdir().unwrap();
        let issues_dir = root.path().join("issues");
        fs::create_dir_all(&issues_dir).unwrap();
        fs::write(issues_dir.join("SDP-1.md"), "body").unwrap();

        let index_dir = root.path().join("index");
        fs::create_dir_all(&index_dir).unwrap();
        let index_path = index_dir.join("issues.ndjson");
        fs::write(
            &index_path,
            r#"{"issue_id":"SDP-1","title":"Fix it","status":"open","file":"issues/SDP-1.md"}"#,
        )
        .unwrap();

        let resolved = resolve_issue(&issues_dir, Some(&index_path), "SDP-1").unwrap();
        assert_eq!(resolved.title.as_deref(), Some("Fix it"));
    }

    #[test]
    fn issue_index_escape_is_rejected_with_no_fallback() {
        let root = tempfile::tempdir().unwrap();
        let issues_dir = root.path().join("issues");
        fs::create_dir_all(&issues_dir).unwrap();
        // A file that legitimately exists at the escaping location, so
        // that canonicalization succeeds and the bounds check is what
        // actually rejects it.
        fs::write(root.path().join("secret.md"), "body").unwrap();
        fs::write(issues_dir.join("SDP-2.md"), "this must never be read").unwrap();

        let index_dir = root.path().join("index");
        fs::create_dir_all(&index_dir).unwrap();
        let index_path = index_dir.join("issues.ndjson");
        fs::write(
            &index_path,
            r#"{"issue_id":"SDP-2","title":"Evil","status":"open","file":"secret.md"}"#,
        )
        .unwrap();

        let err = resolve_issue(&issues_dir, Some(&index_path), "SDP-2").unwrap_err();
        assert!(matches!(err, ResolverError::PathEscape { .. }));
    }

    #[test]
    fn issue_index_miss_falls_back_to_filesystem() {
        let root = tempfile::tempdir().unwrap();
        let issues_dir = root.path().join("issues");
        fs::create_dir_all(&issues_dir).unwrap();
        fs::write(
            issues_dir.join("SDP-3.md"),
            "---\ntitle: \"Direct\"\nstatus: open\n---\n",
        )
        .unwrap();

        let resolved = resolve_issue(&issues_dir, None, "SDP-3").unwrap();
        assert_eq!(resolved.title.as_deref(), Some("Direct"));
    }
}

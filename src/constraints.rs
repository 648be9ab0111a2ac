//! Security constraints for tool execution
//!
//! Enforces the sandbox envelope: file access stays inside the workspace
//! root (after symlink resolution), commands pass a first-token allowlist,
//! execution time and output size are capped.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::SecurityConfig;
use crate::error::{Error, Result};

/// Immutable security constraints evaluated by the tool handlers
#[derive(Debug, Clone)]
pub struct Constraints {
    /// Canonical absolute sandbox root
    allowed_root: PathBuf,
    /// Allowed command names (first token); empty means allow-all
    command_allowlist: HashSet<String>,
    /// Hard cap on command execution time, seconds
    timeout_sec: u64,
    /// Maximum combined output size, characters
    max_output_size: usize,
    /// Maximum stderr size folded into combined output, characters
    max_stderr_size: usize,
    /// Whether `exec_cmd` is available
    exec_enabled: bool,
    /// Reject shell metacharacters before execution
    strict_exec: bool,
}

impl Constraints {
    /// Build constraints for a workspace root, creating the root if missing.
    pub fn new(workspace_dir: &Path, security: &SecurityConfig) -> Result<Self> {
        std::fs::create_dir_all(workspace_dir)?;
        let allowed_root = std::fs::canonicalize(workspace_dir).map_err(|e| {
            Error::Config(format!(
                "Cannot resolve workspace dir {}: {}",
                workspace_dir.display(),
                e
            ))
        })?;

        Ok(Constraints {
            allowed_root,
            command_allowlist: security.allowed_commands.iter().cloned().collect(),
            timeout_sec: security.timeout_sec,
            max_output_size: security.max_output_size,
            max_stderr_size: security.max_stderr_size,
            exec_enabled: security.exec_enabled,
            strict_exec: security.strict_exec,
        })
    }

    /// The canonical sandbox root
    pub fn allowed_root(&self) -> &Path {
        &self.allowed_root
    }

    /// Maximum combined output size, characters
    pub fn max_output_size(&self) -> usize {
        self.max_output_size
    }

    /// Maximum stderr size, characters
    pub fn max_stderr_size(&self) -> usize {
        self.max_stderr_size
    }

    /// Whether `exec_cmd` is enabled
    pub fn exec_enabled(&self) -> bool {
        self.exec_enabled
    }

    /// Whether shell metacharacters are rejected before execution
    pub fn strict_exec(&self) -> bool {
        self.strict_exec
    }

    /// Resolve a tool-supplied path to an absolute path inside the root.
    ///
    /// `..` and `.` segments are normalized lexically, then the deepest
    /// existing ancestor is canonicalized so symlinks cannot escape the
    /// sandbox. Returns `None` when the path is empty or lands outside the
    /// root. The target itself need not exist (`write_file` creates it).
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        if path.is_empty() {
            return None;
        }

        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.allowed_root.join(path)
        };

        let resolved = resolve_existing_prefix(&lexical_normalize(&joined))?;

        if resolved.starts_with(&self.allowed_root) {
            Some(resolved)
        } else {
            None
        }
    }

    /// True iff the path resolves to the root itself or a descendant of it
    pub fn validate_path(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// True iff the command's first token is allowed.
    ///
    /// An empty allowlist allows everything; an empty command is rejected.
    pub fn validate_command(&self, command: &str) -> bool {
        let Some(name) = command.split_whitespace().next() else {
            return false;
        };

        self.command_allowlist.is_empty() || self.command_allowlist.contains(name)
    }

    /// First token of a command string, for error messages
    pub fn command_name(command: &str) -> &str {
        command.split_whitespace().next().unwrap_or(command)
    }

    /// Scan for shell metacharacters and traversal patterns.
    ///
    /// Returns a description of the first dangerous pattern found, or `None`
    /// when the command is clean.
    pub fn scan_shell_metacharacters(command: &str) -> Option<&'static str> {
        const DANGEROUS: [(&str, &str); 8] = [
            ("&&", "command chaining (&&)"),
            ("||", "command chaining (||)"),
            (";", "command chaining (;)"),
            ("|", "piping (|)"),
            ("$(", "command substitution $()"),
            ("`", "command substitution ``"),
            ("../", "path traversal (../)"),
            ("/..", "path traversal (/..)"),
        ];

        DANGEROUS
            .iter()
            .find(|(pattern, _)| command.contains(pattern))
            .map(|(_, description)| *description)
    }

    /// Truncate output middle-out when it exceeds `max_size` characters.
    ///
    /// Keeps the first and last `max_size / 2` characters around a marker
    /// naming how many characters were hidden.
    pub fn truncate_output(&self, output: &str, max_size: usize) -> String {
        let total = output.chars().count();
        if total <= max_size {
            return output.to_string();
        }

        let kept = max_size / 2;
        let head_end = char_offset(output, kept);
        let tail_start = char_offset(output, total - kept);

        format!(
            "{}\n...(output truncated, {} chars hidden)...\n{}",
            &output[..head_end],
            total - max_size,
            &output[tail_start..]
        )
    }

    /// Effective timeout: the minimum of the requested value and the cap
    pub fn effective_timeout(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(timeout) => timeout.min(self.timeout_sec),
            None => self.timeout_sec,
        }
    }

    /// Human-readable summary of the active constraints
    pub fn summary(&self) -> String {
        let allowlist = if self.command_allowlist.is_empty() {
            "all allowed".to_string()
        } else {
            let mut names: Vec<_> = self.command_allowlist.iter().cloned().collect();
            names.sort();
            names.join(", ")
        };

        format!(
            "Security constraints:\n- Allowed root: {}\n- Command allowlist: {}\n- Timeout: {}s\n- Max output: {} chars\n- Max stderr: {} chars",
            self.allowed_root.display(),
            allowlist,
            self.timeout_sec,
            self.max_output_size,
            self.max_stderr_size,
        )
    }
}

/// Byte offset of the nth character (or the string length)
fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Normalize `.` and `..` segments without touching the filesystem.
///
/// Parent segments at the filesystem root stay at the root, matching POSIX
/// resolution of `/..`.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
///
/// This resolves symlinks on the part of the path that exists while still
/// accepting paths whose final components have not been created yet.
fn resolve_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut remainder: Vec<OsString> = Vec::new();

    while !existing.exists() {
        let name = existing.file_name()?.to_os_string();
        remainder.push(name);
        if !existing.pop() {
            return None;
        }
    }

    let mut canonical = std::fs::canonicalize(&existing).ok()?;
    for part in remainder.iter().rev() {
        canonical.push(part);
    }
    Some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn constraints_in(dir: &Path, allowed_commands: &[&str]) -> Constraints {
        let security = SecurityConfig {
            allowed_commands: allowed_commands.iter().map(|s| s.to_string()).collect(),
            ..SecurityConfig::default()
        };
        Constraints::new(dir, &security).unwrap()
    }

    #[test]
    fn test_validate_path_inside_root() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        assert!(constraints.validate_path("file.txt"));
        assert!(constraints.validate_path("sub/dir/file.txt"));
        assert!(constraints.validate_path("."));
    }

    #[test]
    fn test_validate_path_rejects_traversal() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        assert!(!constraints.validate_path("../x"));
        assert!(!constraints.validate_path("../../etc/passwd"));
        assert!(!constraints.validate_path("/etc/passwd"));
        assert!(!constraints.validate_path(""));
    }

    #[test]
    fn test_validate_path_dotdot_within_root() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        // a/b/../c normalizes to a/c, which is inside the root
        assert!(constraints.validate_path("a/b/../c"));
        // a/../../c escapes
        assert!(!constraints.validate_path("a/../../c"));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_path_rejects_symlink_escape() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let link = dir.path().join("escape");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let constraints = constraints_in(dir.path(), &[]);
        assert!(!constraints.validate_path("escape/secret.txt"));
    }

    #[test]
    fn test_validate_command_allowlist() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &["ls", "cat"]);

        assert!(constraints.validate_command("ls -la"));
        assert!(constraints.validate_command("cat file.txt"));
        assert!(!constraints.validate_command("rm -rf /"));
        assert!(!constraints.validate_command(""));
        assert!(!constraints.validate_command("   "));
    }

    #[test]
    fn test_validate_command_empty_allowlist_allows_all() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        assert!(constraints.validate_command("anything goes"));
        assert!(!constraints.validate_command(""));
    }

    #[test]
    fn test_scan_shell_metacharacters() {
        assert_eq!(
            Constraints::scan_shell_metacharacters("ls && rm -rf /"),
            Some("command chaining (&&)")
        );
        assert_eq!(
            Constraints::scan_shell_metacharacters("echo `whoami`"),
            Some("command substitution ``")
        );
        assert_eq!(
            Constraints::scan_shell_metacharacters("cat ../secret"),
            Some("path traversal (../)")
        );
        assert_eq!(Constraints::scan_shell_metacharacters("ls -la"), None);
    }

    #[test]
    fn test_truncate_output_short_passthrough() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        assert_eq!(constraints.truncate_output("short", 100), "short");
    }

    #[test]
    fn test_truncate_output_keeps_head_and_tail() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        let long: String = ('a'..='z').cycle().take(1000).collect();
        let truncated = constraints.truncate_output(&long, 100);

        assert!(truncated.starts_with(&long[..50]));
        assert!(truncated.ends_with(&long[long.len() - 50..]));
        assert!(truncated.contains("output truncated, 900 chars hidden"));

        let marker = "\n...(output truncated, 900 chars hidden)...\n";
        assert_eq!(truncated.len(), 100 + marker.len());
    }

    #[test]
    fn test_effective_timeout() {
        let dir = tempdir().unwrap();
        let constraints = constraints_in(dir.path(), &[]);

        assert_eq!(constraints.effective_timeout(None), 30);
        assert_eq!(constraints.effective_timeout(Some(10)), 10);
        assert_eq!(constraints.effective_timeout(Some(300)), 30);
    }
}

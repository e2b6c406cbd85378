//! Path Normalizer: translates host-native paths into the canonical
//! POSIX virtual-root form (`spec.md` §4.D).

/// Fixed path prefix under which all archive-backed files appear.
pub const VIRTUAL_ROOT: &str = "/snapshot";

const EXTENDED_LENGTH_PREFIX: &str = "\\\\?\\";

/// Pure path translator. Holds just enough context (the project root and,
/// on Windows, the executable's drive letter) to implement `spec.md` §4.D's
/// five-step algorithm.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    /// Absolute directory that contained the application at bundle time.
    project_root: String,
    /// The executable's drive letter, used only by step 3 on Windows hosts.
    exe_drive: Option<char>,
    /// Whether to apply the Windows-specific step (drive-letter rewriting,
    /// case-insensitive drive-letter comparison).
    windows: bool,
}

impl PathNormalizer {
    /// Creates a normalizer for a host where `project_root` is the bundled
    /// application's original root directory. `exe_drive` only matters when
    /// `windows` is `true`.
    pub fn new(project_root: impl Into<String>, exe_drive: Option<char>, windows: bool) -> Self {
        Self {
            project_root: project_root.into(),
            exe_drive,
            windows,
        }
    }

    /// Builds a normalizer using the host's compile-time OS, for the common
    /// case of running on the same platform this crate was built for.
    #[cfg(not(windows))]
    pub fn for_host(project_root: impl Into<String>) -> Self {
        Self::new(project_root, None, false)
    }

    /// Builds a normalizer using the host's compile-time OS, for the common
    /// case of running on the same platform this crate was built for.
    #[cfg(windows)]
    pub fn for_host(project_root: impl Into<String>) -> Self {
        let exe_drive = std::env::current_exe()
            .ok()
            .and_then(|p| p.to_str().and_then(|s| s.chars().next()));
        Self::new(project_root, exe_drive, true)
    }

    /// Translates `path` into its canonical virtual-root form, or returns it
    /// unchanged when none of the recognized shapes apply.
    ///
    /// Idempotent on already-canonical virtual paths:
    /// `normalize(normalize(p)) == normalize(p)`.
    pub fn to_virtual(&self, path: &str) -> String {
        // Step 1: strip the extended-length prefix, if any.
        let path = path.strip_prefix(EXTENDED_LENGTH_PREFIX).unwrap_or(path);

        // Step 2: already canonical.
        if is_under_virtual_root(path) {
            return path.to_string();
        }

        // Step 3: `<drive>\snapshot\...`.
        if self.windows {
            if let Some(rest) = self.strip_drive_snapshot_prefix(path) {
                return join_virtual(&rest.replace('\\', "/"));
            }
        }

        // Step 4: project-root-relative path.
        if let Some(rest) = strip_root_prefix(path, &self.project_root) {
            return join_virtual(&rest.replace('\\', "/"));
        }

        // Step 5: unrecognized shape, left unchanged.
        path.to_string()
    }

    fn strip_drive_snapshot_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let drive = self.exe_drive?;
        let bytes = path.as_bytes();
        if bytes.len() < 2 || bytes[1] != b':' {
            return None;
        }
        let first = *bytes.first()? as char;
        if !first.eq_ignore_ascii_case(&drive) {
            return None;
        }

        let marker = "\\snapshot\\";
        let rest = &path[2..];
        rest.strip_prefix(marker)
    }
}

/// `true` when `path` is `/snapshot` or begins with `/snapshot/`.
pub fn is_under_virtual_root(path: &str) -> bool {
    path == VIRTUAL_ROOT || path.starts_with("/snapshot/")
}

fn join_virtual(rest: &str) -> String {
    if rest.is_empty() {
        VIRTUAL_ROOT.to_string()
    } else {
        format!("{VIRTUAL_ROOT}/{rest}")
    }
}

/// Case-sensitive prefix strip that also consumes exactly one following path
/// separator (`/` or `\`), so `/root` isn't treated as a prefix of
/// `/rootless/x`.
fn strip_root_prefix<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\'))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn windows_normalizer() -> PathNormalizer {
        PathNormalizer::new("C:\\app", Some('C'), true)
    }

    fn posix_normalizer() -> PathNormalizer {
        PathNormalizer::new("/usr/bin", None, false)
    }

    #[test]
    fn already_canonical_is_unchanged() {
        let n = posix_normalizer();
        assert_eq!(n.to_virtual("/snapshot/app/main.js"), "/snapshot/app/main.js");
        assert_eq!(n.to_virtual("/snapshot"), "/snapshot");
    }

    #[test]
    fn idempotent_on_its_own_range() {
        let n = posix_normalizer();
        let once = n.to_virtual("/usr/bin/app/main.js");
        let twice = n.to_virtual(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn project_root_relative_path_is_rewritten() {
        let n = posix_normalizer();
        assert_eq!(n.to_virtual("/usr/bin/app/main.js"), "/snapshot/app/main.js");
    }

    #[test]
    fn unrelated_path_is_unchanged() {
        let n = posix_normalizer();
        assert_eq!(n.to_virtual("/etc/passwd"), "/etc/passwd");
    }

    #[rstest]
    #[case("\\\\?\\C:\\app\\src\\x.js", "/snapshot/src/x.js")]
    #[case("C:\\snapshot\\src\\x.js", "/snapshot/src/x.js")]
    #[case("c:\\snapshot\\a.js", "/snapshot/a.js")]
    #[case("D:\\snapshot\\a.js", "D:\\snapshot\\a.js")]
    fn windows_path_shapes_are_normalized(#[case] input: &str, #[case] expected: &str) {
        let n = windows_normalizer();
        assert_eq!(n.to_virtual(input), expected);
    }

    #[test]
    fn posix_project_root_prefix_is_case_sensitive() {
        let n = PathNormalizer::new("/Usr/Bin", None, false);
        assert_eq!(n.to_virtual("/usr/bin/x.js"), "/usr/bin/x.js");
    }
}

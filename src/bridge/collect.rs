//! Per-invocation collection file names.
//!
//! A collection file lets a script persist intermediate state outside its own
//! stdout/stderr. The gateway only names the file; creating and cleaning it up
//! is the script's business.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Directory collection files are placed in.
pub const COLLECT_DIR: &str = "/tmp";

/// Generate a fresh collection path `<dir>/<prefix>.<token>`.
///
/// The token is a random v4 UUID in simple form (32 lowercase hex digits).
pub fn collect_file_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}.{}", Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_collect_file_shape() {
        let path = collect_file_path(Path::new(COLLECT_DIR), "wanips-update");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        assert!(path.starts_with("/tmp"));
        let token = name.strip_prefix("wanips-update.").unwrap_or_default();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_collect_files_are_unique() {
        let paths: HashSet<PathBuf> = (0..1000)
            .map(|_| collect_file_path(Path::new(COLLECT_DIR), "wanips-update"))
            .collect();
        assert_eq!(paths.len(), 1000);
    }
}

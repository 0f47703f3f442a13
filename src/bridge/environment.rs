//! Minimal environment handed to endpoint scripts.
//!
//! Scripts never inherit the gateway's own environment. They see exactly:
//!
//! | Variable          | Value                                         |
//! |-------------------|-----------------------------------------------|
//! | `PATH`            | [`STD_PATH`], never the gateway's `PATH`      |
//! | `IFS`             | space, tab, newline                           |
//! | `TZ`              | the host `TZ` (empty when unset)              |
//! | `MPTCPKIT_DRYRUN` | `1`, only in dry-run mode                     |
//! | `SCRIPT_DIR`      | the configured script directory               |
//! | `COLLECT_FILE`    | per-invocation collection file                |

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

/// Canonical default search path (`_PATH_STDPATH`).
pub const STD_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin";

/// Whitespace-only field separators.
pub const SAFE_IFS: &str = " \t\n";

/// Marker telling scripts to skip real side effects.
pub const DRY_RUN_VAR: &str = "MPTCPKIT_DRYRUN";

pub const SCRIPT_DIR_VAR: &str = "SCRIPT_DIR";

pub const COLLECT_FILE_VAR: &str = "COLLECT_FILE";

/// Variable name to raw value. Paths are kept byte-exact.
pub type ScriptEnvironment = BTreeMap<String, OsString>;

/// Base environment shared by every script invocation.
///
/// `host_tz` is the only value taken from the gateway process.
pub fn sanitized_environment(dry_run: bool, host_tz: Option<OsString>) -> ScriptEnvironment {
    let mut env = BTreeMap::new();
    env.insert("PATH".to_string(), OsString::from(STD_PATH));
    env.insert("IFS".to_string(), OsString::from(SAFE_IFS));
    env.insert("TZ".to_string(), host_tz.unwrap_or_default());
    if dry_run {
        env.insert(DRY_RUN_VAR.to_string(), OsString::from("1"));
    }
    env
}

/// Full environment for one invocation: the sanitized base plus
/// `SCRIPT_DIR` and `COLLECT_FILE`.
pub fn invocation_environment(
    dry_run: bool,
    script_dir: &Path,
    collect_file: &Path,
) -> ScriptEnvironment {
    let mut env = sanitized_environment(dry_run, std::env::var_os("TZ"));
    env.insert(SCRIPT_DIR_VAR.to_string(), script_dir.as_os_str().to_owned());
    env.insert(
        COLLECT_FILE_VAR.to_string(),
        collect_file.as_os_str().to_owned(),
    );
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::OsStr;

    fn keys(env: &ScriptEnvironment) -> Vec<&str> {
        env.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_base_environment_keys() {
        let env = sanitized_environment(false, None);
        assert_eq!(keys(&env), vec!["IFS", "PATH", "TZ"]);
        assert_eq!(env["PATH"], STD_PATH);
        assert_eq!(env["IFS"], " \t\n");
        assert_eq!(env["TZ"], "");
    }

    #[test]
    fn test_dry_run_marker() {
        let env = sanitized_environment(true, None);
        assert_eq!(
            env.get(DRY_RUN_VAR).map(OsString::as_os_str),
            Some(OsStr::new("1"))
        );
    }

    #[test]
    fn test_tz_passthrough() {
        let env = sanitized_environment(false, Some(OsString::from("Europe/Paris")));
        assert_eq!(env["TZ"], "Europe/Paris");
    }

    #[test]
    fn test_invocation_environment_is_exact() {
        let env = invocation_environment(
            true,
            Path::new("/etc/mptcpkit/endpoints"),
            Path::new("/tmp/wanips-update.abc"),
        );

        assert_eq!(
            keys(&env),
            vec![
                "COLLECT_FILE",
                "IFS",
                "MPTCPKIT_DRYRUN",
                "PATH",
                "SCRIPT_DIR",
                "TZ"
            ]
        );
        assert_eq!(env[SCRIPT_DIR_VAR], "/etc/mptcpkit/endpoints");
        assert_eq!(env[COLLECT_FILE_VAR], "/tmp/wanips-update.abc");
    }

    #[test]
    fn test_host_path_not_inherited() {
        let env = invocation_environment(false, Path::new("/s"), Path::new("/tmp/c"));
        assert_eq!(env["PATH"], STD_PATH);
        assert!(!env.contains_key("HOME"));
        assert!(!env.contains_key("CARGO_MANIFEST_DIR"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_script_dir_kept_exact() {
        use std::os::unix::ffi::OsStrExt;

        let dir = Path::new(OsStr::from_bytes(b"/srv/endpoints-\xff"));
        let env = invocation_environment(false, dir, Path::new("/tmp/c"));
        assert_eq!(env[SCRIPT_DIR_VAR].as_bytes(), b"/srv/endpoints-\xff");
    }
}

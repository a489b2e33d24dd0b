//! Lock-file naming scheme.
//!
//! Every contender for a target path creates one marker file next to it:
//!
//! ```text
//! <target-basename>.lock.<hostname>.<pid>.<32-hex-random-token>.pid
//! ```
//!
//! The filename is the wire format of this crate: arbitration reads the
//! hostname and PID back out of candidate filenames by fixed position from
//! the *end* (4th-from-last dot segment = hostname, 3rd-from-last = PID),
//! which tolerates dots in the target basename.
//!
//! # Known fragility
//!
//! A hostname containing literal dots (an FQDN) spans several dot segments,
//! so the positional parse only recovers its last label. Such hosts never
//! match the local hostname and their abandoned lock files are never
//! reclaimed. This is inherited behavior, kept for on-disk compatibility
//! with peers using the same scheme rather than silently changed.

/// A hostname and PID recovered from a candidate lock filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedLockName {
    pub hostname: String,
    pub pid: u32,
}

/// The local hostname with path-separator characters replaced, so it is
/// always safe to embed in a filename. Falls back to `"unknown"` if the
/// hostname cannot be read.
pub(crate) fn local_hostname() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    sanitize_hostname(&host)
}

/// Replace path separators in a hostname so the lock filename stays
/// filesystem-safe. Dots are intentionally left alone (see module docs).
pub(crate) fn sanitize_hostname(host: &str) -> String {
    host.replace(['/', '\\'], "_")
}

/// A fresh 128-bit random token formatted as 32 lowercase hex characters.
pub(crate) fn random_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Compose a lock filename for the given target basename.
pub(crate) fn lock_file_name(base: &str, host: &str, pid: u32, token: &str) -> String {
    format!("{base}.lock.{host}.{pid}.{token}.pid")
}

/// Whether `file_name` is a lock file for the target basename `base`
/// (shape check only; the owner may be any process on any host).
pub(crate) fn is_candidate(file_name: &str, base: &str) -> bool {
    file_name.len() > base.len() + ".lock.".len() + ".pid".len()
        && file_name.starts_with(base)
        && file_name[base.len()..].starts_with(".lock.")
        && file_name.ends_with(".pid")
}

/// Recover the hostname and PID from a candidate lock filename.
///
/// Returns `None` for filenames that do not decompose into at least the
/// expected six dot segments or whose PID field is not a decimal number.
/// Malformed names are the caller's cue to skip the file, not to fail.
pub(crate) fn parse_lock_name(file_name: &str) -> Option<ParsedLockName> {
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() < 6 || parts[parts.len() - 1] != "pid" {
        return None;
    }
    let hostname = parts[parts.len() - 4].to_string();
    let pid = parts[parts.len() - 3].parse::<u32>().ok()?;
    Some(ParsedLockName { hostname, pid })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_and_parse_round_trip() {
        let name = lock_file_name("x.txt", "h1", 100, &"ab".repeat(16));
        assert!(is_candidate(&name, "x.txt"));

        let parsed = parse_lock_name(&name).unwrap();
        assert_eq!(parsed.hostname, "h1");
        assert_eq!(parsed.pid, 100);
    }

    #[test]
    fn candidate_requires_exact_base_and_suffix() {
        let name = lock_file_name("x.txt", "h1", 100, &random_token());
        assert!(!is_candidate(&name, "x"));
        assert!(!is_candidate(&name, "y.txt"));
        assert!(!is_candidate("x.txt.lock.h1.100.deadbeef", "x.txt"));
        assert!(!is_candidate("x.txt", "x.txt"));
    }

    #[test]
    fn base_with_dots_parses_from_the_end() {
        let name = lock_file_name("archive.tar.gz", "box", 42, &random_token());
        let parsed = parse_lock_name(&name).unwrap();
        assert_eq!(parsed.hostname, "box");
        assert_eq!(parsed.pid, 42);
    }

    #[test]
    fn dotted_hostname_yields_only_its_last_label() {
        // Characterizes the inherited FQDN fragility: the positional parse
        // recovers "example" then "com"... from the end, so the hostname
        // field collapses to the last label.
        let name = lock_file_name("x", "node1.example.com", 7, &random_token());
        let parsed = parse_lock_name(&name).unwrap();
        assert_eq!(parsed.hostname, "com");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert!(parse_lock_name("x.lock.h1.notapid.deadbeef.pid").is_none());
        assert!(parse_lock_name("short.pid").is_none());
        assert!(parse_lock_name("x.lock.h1.100.deadbeef.tmp").is_none());
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_hostname("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_hostname("plain-host"), "plain-host");
    }

    #[test]
    fn random_tokens_are_32_hex_chars_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn local_hostname_is_filename_safe() {
        let host = local_hostname();
        assert!(!host.is_empty());
        assert!(!host.contains('/'));
        assert!(!host.contains('\\'));
    }
}

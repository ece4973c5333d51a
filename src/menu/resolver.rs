//! Action resolution: raw action strings to runnable form.

#![allow(missing_docs)]

use std::fmt;

use crate::core::errors::{PanelError, Result};
use crate::stats::StatMethod;

/// Prefix marking a stat wildcard action, e.g. `stat:get_cpu_temp`.
pub const STAT_PREFIX: &str = "stat:";

/// A menu action in executable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    ShellCommand(String),
    StatLookup(StatMethod),
}

impl fmt::Display for ResolvedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShellCommand(command) => write!(f, "sh: {command}"),
            Self::StatLookup(method) => write!(f, "{STAT_PREFIX}{}", method.getter_name()),
        }
    }
}

/// Resolve a raw action. Stat wildcards must name an allow-listed method;
/// anything else is passed to the shell verbatim (surrounding whitespace trimmed).
pub fn resolve(raw: &str) -> Result<ResolvedAction> {
    let trimmed = raw.trim();
    match trimmed.strip_prefix(STAT_PREFIX) {
        Some(name) => StatMethod::from_name(name)
            .map(ResolvedAction::StatLookup)
            .ok_or_else(|| PanelError::UnknownStatMethod {
                name: name.to_string(),
            }),
        None => Ok(ResolvedAction::ShellCommand(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn allow_listed_wildcards_resolve_to_lookups() {
        assert_eq!(
            resolve("stat:get_ip").unwrap(),
            ResolvedAction::StatLookup(StatMethod::Ip)
        );
        assert_eq!(
            resolve("stat:check_internet").unwrap(),
            ResolvedAction::StatLookup(StatMethod::CheckInternet)
        );
        assert_eq!(
            resolve("  stat:uptime ").unwrap(),
            ResolvedAction::StatLookup(StatMethod::Uptime)
        );
    }

    #[test]
    fn unknown_wildcards_are_rejected() {
        for raw in ["stat:", "stat:get_secrets", "stat:__class__", "stat:os.system"] {
            let err = resolve(raw).unwrap_err();
            assert!(
                matches!(err, PanelError::UnknownStatMethod { .. }),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn everything_else_is_a_shell_command() {
        assert_eq!(
            resolve("  df -h | tail -1 ").unwrap(),
            ResolvedAction::ShellCommand("df -h | tail -1".to_string())
        );
        // Only a leading prefix marks a wildcard.
        assert_eq!(
            resolve("echo stat:get_ip").unwrap(),
            ResolvedAction::ShellCommand("echo stat:get_ip".to_string())
        );
        assert_eq!(
            resolve("STAT:get_ip").unwrap(),
            ResolvedAction::ShellCommand("STAT:get_ip".to_string())
        );
    }

    #[test]
    fn display_uses_getter_spelling() {
        let action = ResolvedAction::StatLookup(StatMethod::CpuTemp);
        assert_eq!(action.to_string(), "stat:get_cpu_temp");
    }

    proptest! {
        #[test]
        fn non_prefixed_strings_pass_through(raw in "[a-z0-9 |;-]{1,40}") {
            prop_assume!(!raw.trim().is_empty());
            let resolved = resolve(&raw).unwrap();
            prop_assert_eq!(resolved, ResolvedAction::ShellCommand(raw.trim().to_string()));
        }
    }
}

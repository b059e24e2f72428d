//! Denylist screening of process arguments taken from untrusted configuration.
//!
//! This is a best-effort filter, not a sandbox. It only rejects the patterns
//! listed in [`RejectionReason`].

use super::{RejectionReason, SafetyRejection};

/// Longest argument accepted, in characters.
pub const MAX_ARGUMENT_LENGTH: usize = 1000;

/// Arguments longer than this are truncated in rejection messages.
const REPORTED_ARGUMENT_LENGTH: usize = 100;

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    ".exe", ".bat", ".cmd", ".com", ".scr", ".msi", ".ps1", ".vbs", ".sh", ".bash", ".zsh",
    ".py", ".pl", ".rb", ".js", ".mjs", ".cjs", ".jar", ".dll", ".so", ".dylib",
];

const FILE_FLAGS: &[&str] = &[
    "-o",
    "-f",
    "--file",
    "--files",
    "--input",
    "--output",
    "--out",
    "--config",
    "--log-file",
    "--logfile",
    "--write",
    "--read",
    "--load",
    "--save",
    "--import",
    "--require",
    "--eval",
    "--exec",
];

const RELATIVE_PREFIXES: &[&str] = &["./", ".\\", "~/", "~\\"];

/// Checks every argument and fails on the first match.
///
/// # Errors
///
/// Returns [`SafetyRejection`] naming the first offending argument.
///
/// # Examples
///
/// ```
/// use toolbridge::mcp::domain::ensure_safe_arguments;
///
/// let accepted = vec!["hello".to_owned(), "--flag=value".to_owned()];
/// assert!(ensure_safe_arguments(&accepted).is_ok());
///
/// let rejected = vec!["../secret".to_owned()];
/// assert!(ensure_safe_arguments(&rejected).is_err());
/// ```
pub fn ensure_safe_arguments(args: &[String]) -> Result<(), SafetyRejection> {
    args.iter().try_for_each(|argument| check_argument(argument))
}

/// Checks one argument against the denylist.
///
/// # Errors
///
/// Returns [`SafetyRejection`] when the argument matches a rule.
pub fn check_argument(argument: &str) -> Result<(), SafetyRejection> {
    rejection_reason(argument).map_or(Ok(()), |reason| {
        Err(SafetyRejection {
            argument: truncate_for_report(argument),
            reason,
        })
    })
}

fn rejection_reason(argument: &str) -> Option<RejectionReason> {
    if argument.chars().count() > MAX_ARGUMENT_LENGTH {
        return Some(RejectionReason::TooLong);
    }
    if argument.contains('\0') {
        return Some(RejectionReason::NullByte);
    }

    let lowered = argument.to_ascii_lowercase();
    if lowered.starts_with("file://") {
        return Some(RejectionReason::FileUrl);
    }
    if is_absolute_path(argument) {
        return Some(RejectionReason::AbsolutePath);
    }
    if has_parent_traversal(argument) {
        return Some(RejectionReason::ParentTraversal);
    }
    if RELATIVE_PREFIXES
        .iter()
        .any(|prefix| argument.starts_with(prefix))
        || argument == "~"
    {
        return Some(RejectionReason::RelativePathPrefix);
    }
    if is_file_flag(&lowered) {
        return Some(RejectionReason::FileFlag);
    }
    if EXECUTABLE_EXTENSIONS
        .iter()
        .any(|extension| lowered.ends_with(extension))
    {
        return Some(RejectionReason::ExecutableExtension);
    }
    None
}

fn is_absolute_path(argument: &str) -> bool {
    if argument.starts_with('/') || argument.starts_with("\\\\") {
        return true;
    }

    let mut characters = argument.chars();
    matches!(
        (characters.next(), characters.next(), characters.next()),
        (Some(drive), Some(':'), Some('\\' | '/')) if drive.is_ascii_alphabetic()
    )
}

fn has_parent_traversal(argument: &str) -> bool {
    argument
        .split(['/', '\\', '='])
        .any(|segment| segment == "..")
}

fn is_file_flag(lowered: &str) -> bool {
    let flag = lowered.split_once('=').map_or(lowered, |(name, _)| name);
    FILE_FLAGS.contains(&flag)
}

fn truncate_for_report(argument: &str) -> String {
    if argument.chars().count() <= REPORTED_ARGUMENT_LENGTH {
        return argument.to_owned();
    }
    let mut shortened: String = argument.chars().take(REPORTED_ARGUMENT_LENGTH).collect();
    shortened.push_str("...");
    shortened
}

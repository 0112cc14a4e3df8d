//! Process exit codes of the `pagespeed` binary.

/// Analysis ran and every rule completed
pub const SUCCESS: i32 = 0;

/// Analysis ran, but at least one rule reported a failure
pub const RULE_FAILURES: i32 = 1;

/// The tool itself failed: bad arguments, unreadable config or snapshot, and so on
pub const TOOL_ERROR: i32 = 2;

pub mod exit {
    use super::*;

    pub fn success() -> ! {
        std::process::exit(SUCCESS);
    }

    pub fn rule_failures() -> ! {
        std::process::exit(RULE_FAILURES);
    }

    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }
}

/// Exit code for a finished analysis.
pub fn for_results(results: &crate::results::Results) -> i32 {
    if results.is_success() { SUCCESS } else { RULE_FAILURES }
}

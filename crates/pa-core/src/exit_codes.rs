//! Exit codes for the pa-core CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/request errors (fixable by changing the invocation)
//! - 20-29: Internal and environment errors

use pa_common::{Error, ErrorCategory};

/// Exit codes for pa-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Analysis completed (possibly with an empty result)
    Clean = 0,

    // ========================================================================
    // User / Request Errors (10-19)
    // ========================================================================
    /// Invalid arguments, unreadable dataset or invalid configuration
    ArgsError = 10,

    /// Caller may not see the requested definition scope
    AccessDenied = 12,

    /// Malformed analysis request (missing bounds, unknown flow node)
    ValidationError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// Instance store failed mid-analysis
    StoreError = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes 10-19 can be resolved by changing the request.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::AccessDenied => "ERR_ACCESS_DENIED",
            ExitCode::ValidationError => "ERR_VALIDATION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::StoreError => "ERR_STORE",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Access => ExitCode::AccessDenied,
            ErrorCategory::Validation => ExitCode::ValidationError,
            ErrorCategory::Definition | ErrorCategory::Config => ExitCode::ArgsError,
            ErrorCategory::Store => ExitCode::StoreError,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

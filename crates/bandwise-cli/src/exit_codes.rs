//! Process exit codes. Part of the public contract of the `bandwise` binary.

use bandwise_core::{ErrorKind, PipelineError};

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 1; // Usage, config or input file problem
pub const CREDENTIAL_ERROR: i32 = 2;
pub const RATE_LIMITED: i32 = 3; // Retries exhausted
pub const MALFORMED_OUTPUT: i32 = 4;
pub const BACKEND_ERROR: i32 = 5;

pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NoContentSubmitted => CONFIG_ERROR,
        ErrorKind::InvalidCredential => CREDENTIAL_ERROR,
        ErrorKind::RateLimited | ErrorKind::RateLimitExhausted => RATE_LIMITED,
        ErrorKind::MalformedOutput => MALFORMED_OUTPUT,
        ErrorKind::Unclassified => BACKEND_ERROR,
    }
}

/// Exit code for an error that reached `main`.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PipelineError>()
        .map(|e| for_kind(e.kind))
        .unwrap_or(CONFIG_ERROR)
}

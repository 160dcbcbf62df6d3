//! Command-line errors
//!
//! Failures from the session crates propagate through `anyhow` in `main`,
//! and argument errors are reported by clap; these cover what the CLI
//! rejects after parsing, before doing any work.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("password required: set SESSION_PASSWORD or pass --password")]
    MissingPassword,

    #[error("signin needs --email or --phone")]
    MissingIdentifier,
}

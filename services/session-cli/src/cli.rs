//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use session_auth::Identifier;

/// Client for an API behind session authentication.
///
/// The password may also be given in SESSION_PASSWORD, which takes precedence.
#[derive(Parser, Debug)]
#[command(name = "session-cli", version)]
pub struct Cli {
    /// Config file (default: CONFIG_PATH, then ./session-cli.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Print session metrics in Prometheus text format to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sign in with a password and store the session
    #[command(name = "signin")]
    SignIn {
        #[command(flatten)]
        identifier: IdentifierArgs,
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and store its first session
    #[command(name = "signup")]
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Revoke and forget the stored session
    #[command(name = "signout")]
    SignOut,
    /// Show whether a session is stored and when it expires
    Status,
    /// Renew the session now
    Refresh,
    /// Authenticated GET against the API, printing status and body
    Get { path: String },
}

impl Command {
    /// Whether the command sends requests through the authenticated client.
    pub fn uses_session(&self) -> bool {
        matches!(self, Command::Get { .. } | Command::Refresh)
    }
}

/// Exactly one of `--email` or `--phone`.
#[derive(Args, Debug, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct IdentifierArgs {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
}

impl IdentifierArgs {
    pub fn into_identifier(self) -> Option<Identifier> {
        match (self.email, self.phone) {
            (Some(email), _) => Some(Identifier::Email(email)),
            (None, Some(phone)) => Some(Identifier::Phone(phone)),
            (None, None) => None,
        }
    }
}

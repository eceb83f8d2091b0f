use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use regauth_core::OptionalBool;

#[derive(Parser, Debug)]
#[command(name = "regauth", version, about = "Manage container registry credentials")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Logout of a container registry
    #[command(after_help = "Example: regauth logout quay.io")]
    Logout(LogoutArgs),

    /// Login to a container registry
    #[command(after_help = "Example: regauth login -u myuser quay.io")]
    Login(LoginArgs),

    /// Print the username stored for a registry
    GetLogin(GetLoginArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AuthFileArgs {
    /// Path of the authentication file
    #[arg(long, value_name = "PATH")]
    pub authfile: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TlsArgs {
    /// Require HTTPS and verify certificates when accessing the registry
    #[arg(
        long = "tls-verify",
        action = ArgAction::Set,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub tls_verify: Option<bool>,
}

impl TlsArgs {
    pub fn tls_verify(&self) -> OptionalBool {
        self.tls_verify.into()
    }
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    #[command(flatten)]
    pub auth: AuthFileArgs,

    #[command(flatten)]
    pub tls: TlsArgs,

    /// Remove the credentials of all registries
    #[arg(short, long, conflicts_with = "registries")]
    pub all: bool,

    /// Registries (or registry/repository scopes) to log out of
    #[arg(value_name = "REGISTRY", required_unless_present = "all")]
    pub registries: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub auth: AuthFileArgs,

    #[command(flatten)]
    pub tls: TlsArgs,

    /// Username for the registry
    #[arg(short, long)]
    pub username: String,

    /// Password for the registry
    #[arg(short, long, conflicts_with = "password_stdin")]
    pub password: Option<String>,

    /// Read the password from stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Forget the credentials after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub expires_in: Option<u64>,

    /// Registry (or registry/repository scope) to log in to
    #[arg(value_name = "REGISTRY")]
    pub registry: String,
}

#[derive(Args, Debug)]
pub struct GetLoginArgs {
    #[command(flatten)]
    pub auth: AuthFileArgs,

    /// Registry (or registry/repository scope) to look up
    #[arg(value_name = "REGISTRY")]
    pub registry: String,
}

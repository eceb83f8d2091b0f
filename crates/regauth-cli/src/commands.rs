use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use regauth_core::{
    Config, FileCredentialStore, LoginRequest, PathSources, SessionManager, SystemContext,
};
use tracing::{debug, error};

use crate::cli::{AuthFileArgs, GetLoginArgs, LoginArgs, LogoutArgs, TlsArgs};

/// Repository-scoped targets are always accepted from the command line.
const ACCEPT_REPOSITORIES: bool = true;

fn open_session(auth: &AuthFileArgs, tls: Option<&TlsArgs>) -> Result<SessionManager<FileCredentialStore>> {
    let config = Config::load().context("Failed to load configuration")?;
    let sources = PathSources::from_env(auth.authfile.clone());

    let store = config
        .open_store(&sources)
        .context("Failed to locate auth file")?;
    debug!(path = %store.path().display(), "opened credential store");

    let context = tls
        .map(|tls| SystemContext::with_tls_verify(tls.tls_verify()))
        .unwrap_or_default();

    let mut session = SessionManager::new(store, context);
    if let Some(path) = config.docker_config_path(&sources) {
        session = session.with_docker_config(FileCredentialStore::new(path));
    }
    Ok(session)
}

pub fn logout(args: LogoutArgs) -> Result<ExitCode> {
    let mut session = open_session(&args.auth, Some(&args.tls))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.all {
        let count = session
            .logout_all(&mut out)
            .context("Failed to remove credentials")?;
        debug!(count, "removed all credentials");
        return Ok(ExitCode::SUCCESS);
    }

    let report = session.logout(&args.registries, ACCEPT_REPOSITORIES, &mut out)?;
    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    for (target, err) in report.failures() {
        error!(registry = target, error = %err, "logout failed");
    }
    Ok(ExitCode::FAILURE)
}

pub fn login(args: LoginArgs) -> Result<ExitCode> {
    let expires_in = args.expires_in.map(expiry_from_secs).transpose()?;
    let secret = read_secret(&args)?;
    let mut session = open_session(&args.auth, Some(&args.tls))?;

    let request = LoginRequest {
        target: args.registry.clone(),
        username: args.username.clone(),
        secret,
        expires_in,
        accept_repositories: ACCEPT_REPOSITORIES,
    };

    let stdout = io::stdout();
    session
        .login(&request, &mut stdout.lock())
        .with_context(|| format!("Failed to log in to {}", args.registry))?;
    Ok(ExitCode::SUCCESS)
}

pub fn get_login(args: GetLoginArgs) -> Result<ExitCode> {
    let session = open_session(&args.auth, None)?;
    let username = session.get_login(&args.registry, ACCEPT_REPOSITORIES)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", username)?;
    Ok(ExitCode::SUCCESS)
}

fn expiry_from_secs(secs: u64) -> Result<chrono::Duration> {
    match i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds) {
        Some(ttl) => Ok(ttl),
        None => bail!("--expires-in {} is out of range", secs),
    }
}

fn read_secret(args: &LoginArgs) -> Result<String> {
    if let Some(ref password) = args.password {
        return Ok(password.clone());
    }

    if args.password_stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        let secret = line.trim_end_matches(['\r', '\n']).to_string();
        if secret.is_empty() {
            bail!("No password provided on stdin");
        }
        return Ok(secret);
    }

    rpassword::prompt_password("Password: ").context("Failed to read password")
}

//! 1Password CLI wrapper and on-disk session cache.
//!
//! Every `op` call after sign-in is non-interactive: the cached session token
//! is injected as the `OP_SESSION_<name>` environment variable. The session
//! file is a small JSON record in the user's home directory (configurable)
//! and is replaced whenever `op` stops accepting the token.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, bail, ensure};
use chrono::{Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Sessions are considered stale after 30 days even if `op` would still
/// accept the token.
const SESSION_TTL_DAYS: i64 = 30;

/// On-disk record of a 1Password CLI session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Environment variable name emitted by `op signin`, e.g. `OP_SESSION_my`.
    pub session_name: String,
    /// The opaque session token.
    pub session_token: String,
    /// Unix timestamp after which the session is not worth probing.
    #[serde(default)]
    pub expiration: Option<i64>,
}

impl Session {
    pub fn new(session_name: String, session_token: String) -> Self {
        Self {
            session_name,
            session_token,
            expiration: Some((Utc::now() + Duration::days(SESSION_TTL_DAYS)).timestamp()),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expiration {
            Some(expiration) => expiration <= Utc::now().timestamp(),
            None => false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read session file {path:?}"))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Session file {path:?} is not a valid session record"))
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write session file {path:?}"))
    }
}

/// Handle for non-interactive `op` calls authorized by a session token.
pub struct Op {
    session: Session,
}

impl Op {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("op");
        command
            .args(args)
            .env(&self.session.session_name, &self.session.session_token);
        command
    }

    fn output(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!("op {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .context("Failed to run op, is it installed?")?;
        ensure!(
            output.status.success(),
            "op {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(output.stdout)
    }

    /// Lightweight probe used to decide whether the session token still
    /// authenticates.
    pub fn account(&self) -> Result<String> {
        let out = self.output(&["get", "account"])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Lists login items carrying the given tags.
    pub fn list_items(&self, tags: &str) -> Result<Vec<Item>> {
        let out = self.output(&["list", "items", "--tags", tags, "--categories", "login"])?;
        serde_json::from_slice(&out).context("Unexpected item list from op")
    }

    /// Fetches the full item, including its sections and fields.
    pub fn get_item(&self, title: &str) -> Result<Item> {
        let out = self.output(&["get", "item", title])?;
        serde_json::from_slice(&out).with_context(|| format!("Unexpected item {title:?} from op"))
    }

    /// Fetches the current one-time password for the item.
    pub fn totp(&self, title: &str) -> Result<String> {
        let out = self.output(&["get", "totp", title])?;
        let totp = String::from_utf8_lossy(&out).trim().to_string();
        ensure!(!totp.is_empty(), "No one-time password defined for {title:?}");
        Ok(totp)
    }
}

/// Returns an authenticated handle, reusing the cached session when `op`
/// still accepts it and signing in again otherwise. A sign-in gets exactly
/// one retried probe before giving up.
pub fn check_session(path: &Path) -> Result<Op> {
    let session = ensure_session(
        path,
        |session| Op::new(session.clone()).account().is_ok(),
        signin,
    )?;
    Ok(Op::new(session))
}

fn ensure_session<P, S>(path: &Path, mut probe: P, signin: S) -> Result<Session>
where
    P: FnMut(&Session) -> bool,
    S: FnOnce(&Path) -> Result<Session>,
{
    if path.is_file() {
        let session = Session::load(path)?;
        if !session.is_expired() && probe(&session) {
            debug!("Reusing 1Password session from {path:?}");
            return Ok(session);
        }
    }
    let session = signin(path)?;
    if probe(&session) {
        return Ok(session);
    }
    bail!("1Password rejected the session token obtained from signin")
}

/// Signs in to 1Password interactively and persists the fresh session.
///
/// The master password is read without echo and handed to `op signin` on
/// stdin from a short-lived background writer; closing the pipe lets `op`
/// finish reading. The sign-in output is a single shell export line such as
/// `export OP_SESSION_my="Token..."`.
pub fn signin(path: &Path) -> Result<Session> {
    let password = rpassword::prompt_password("Enter your 1Password password: ")
        .context("Failed to read password")?;

    let mut child = Command::new("op")
        .arg("signin")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to run op signin, is op installed?")?;

    let mut stdin = child.stdin.take().context("Failed to open op stdin")?;
    let writer = thread::spawn(move || {
        let _ = stdin.write_all(password.as_bytes());
        // stdin drops here, closing the pipe
    });

    let output = child.wait_with_output().context("op signin failed")?;
    let _ = writer.join();
    ensure!(output.status.success(), "op signin did not succeed");

    let (name, token) = parse_signin_output(&String::from_utf8_lossy(&output.stdout))?;
    let session = Session::new(name, token);
    session.store(path)?;
    println!("1Password session file saved to: {}", path.display());
    Ok(session)
}

fn parse_signin_output(output: &str) -> Result<(String, String)> {
    let line = output
        .lines()
        .find(|l| l.starts_with("export "))
        .context("op signin did not emit a session export line")?;
    let assignment = line.trim_start_matches("export ").trim();
    let (name, token) = assignment
        .split_once('=')
        .with_context(|| format!("Malformed session export line {line:?}"))?;
    let token = token.trim_matches('"');
    ensure!(
        !name.is_empty() && !token.is_empty(),
        "Malformed session export line {line:?}"
    );
    Ok((name.to_string(), token.to_string()))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempfile::tempdir;

    use super::*;

    fn fake_session(token: &str) -> Session {
        Session::new("OP_SESSION_test".to_string(), token.to_string())
    }

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        let session = fake_session("tok");
        session.store(&path).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.session_name, "OP_SESSION_test");
        assert_eq!(loaded.session_token, "tok");
        assert_eq!(loaded.expiration, session.expiration);
    }

    #[test]
    fn session_without_expiration_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        std::fs::write(&path, r#"{"session_name":"OP_SESSION_a","session_token":"b"}"#).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.expiration, None);
        assert!(!loaded.is_expired());
    }

    #[test]
    fn garbage_session_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        std::fs::write(&path, "not json").unwrap();
        assert!(Session::load(&path).is_err());
    }

    #[test]
    fn valid_cached_session_is_reused_without_signin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        fake_session("cached").store(&path).unwrap();

        let session = ensure_session(
            &path,
            |_| true,
            |_| panic!("signin must not run for a valid cached session"),
        )
        .unwrap();
        assert_eq!(session.session_token, "cached");
    }

    #[test]
    fn missing_file_triggers_exactly_one_signin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        let signins = Cell::new(0);

        let session = ensure_session(
            &path,
            |_| true,
            |_| {
                signins.set(signins.get() + 1);
                Ok(fake_session("fresh"))
            },
        )
        .unwrap();
        assert_eq!(signins.get(), 1);
        assert_eq!(session.session_token, "fresh");
    }

    #[test]
    fn rejected_token_signs_in_and_reprobes_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        fake_session("stale").store(&path).unwrap();
        let probes = Cell::new(0);

        let session = ensure_session(
            &path,
            |session| {
                probes.set(probes.get() + 1);
                session.session_token == "fresh"
            },
            |_| Ok(fake_session("fresh")),
        )
        .unwrap();
        // one failed probe on the stale token, one successful on the fresh one
        assert_eq!(probes.get(), 2);
        assert_eq!(session.session_token, "fresh");
    }

    #[test]
    fn failed_reprobe_after_signin_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");

        let result = ensure_session(&path, |_| false, |_| Ok(fake_session("fresh")));
        assert!(result.is_err());
    }

    #[test]
    fn expired_session_skips_the_probe() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".op_session");
        let mut session = fake_session("old");
        session.expiration = Some(0);
        session.store(&path).unwrap();

        let session = ensure_session(
            &path,
            |session| {
                assert_eq!(session.session_token, "fresh", "expired token must not be probed");
                true
            },
            |_| Ok(fake_session("fresh")),
        )
        .unwrap();
        assert_eq!(session.session_token, "fresh");
    }

    #[test]
    fn signin_export_line_parses() {
        let out = "export OP_SESSION_my=\"_N8UtA6Y-NGyiWycztN9PZbuDA0g\"\n";
        let (name, token) = parse_signin_output(out).unwrap();
        assert_eq!(name, "OP_SESSION_my");
        assert_eq!(token, "_N8UtA6Y-NGyiWycztN9PZbuDA0g");
    }

    #[test]
    fn signin_output_without_export_line_is_an_error() {
        assert!(parse_signin_output("signed in\n").is_err());
    }
}

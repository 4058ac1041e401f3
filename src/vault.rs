//! aws-vault CLI wrapper: keyring session listing and the login pipe.

use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, ensure};
use log::debug;

/// Remaining durations of the keyring-held sessions per profile, read from
/// `aws-vault list`. Profiles without a session are absent; a non-positive
/// duration means the session has already expired.
pub fn sessions() -> Result<HashMap<String, i64>> {
    let output = Command::new("aws-vault")
        .arg("list")
        .output()
        .context("Failed to run aws-vault, is it installed?")?;
    ensure!(
        output.status.success(),
        "aws-vault list failed: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    );
    Ok(parse_sessions(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses the tabular `aws-vault list` output into profile name → remaining
/// session seconds. The sessions column holds entries like
/// `sts.GetSessionToken:4h29m5s` (comma-separated when several exist) or `-`
/// when none does; the longest remaining duration wins.
fn parse_sessions(output: &str) -> HashMap<String, i64> {
    let mut sessions = HashMap::new();
    // first two lines are the header and its ==== underline
    for line in output.lines().skip(2) {
        let mut columns = line.split_whitespace();
        let (Some(profile), Some(_credentials)) = (columns.next(), columns.next()) else {
            continue;
        };
        let remaining = columns
            .flat_map(|c| c.split(','))
            .filter(|entry| *entry != "-" && !entry.is_empty())
            .filter_map(|entry| parse_go_duration(entry.rsplit(':').next().unwrap_or(entry)))
            .max();
        if let Some(remaining) = remaining {
            sessions.insert(profile.to_string(), remaining);
        }
    }
    sessions
}

/// Parses a Go-style duration string such as `4h29m5s`, `59m2.39s` or
/// `-3m2s` into whole seconds.
fn parse_go_duration(duration: &str) -> Option<i64> {
    let (negative, rest) = match duration.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, duration),
    };
    if rest == "0" {
        return Some(0);
    }
    let mut total = 0f64;
    let mut number = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600.0,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1e-3
            }
            'm' => 60.0,
            's' => 1.0,
            'µ' | 'u' if chars.peek() == Some(&'s') => {
                chars.next();
                1e-6
            }
            'n' if chars.peek() == Some(&'s') => {
                chars.next();
                1e-9
            }
            _ => return None,
        };
        let value: f64 = number.parse().ok()?;
        number.clear();
        total += value * unit;
    }
    if !number.is_empty() {
        // trailing digits without a unit
        return None;
    }
    let seconds = total as i64;
    Some(if negative { -seconds } else { seconds })
}

/// Logs into the console by piping `aws-vault login --stdout` into a browser
/// launch.
///
/// Two processes are connected through an OS pipe: `aws-vault` writes the
/// sign-in URL, `xargs -t` appends it to the browser command line and execs
/// it. The main flow waits on the consumer while a background thread reaps
/// the producer.
pub fn login_via_pipe(alias: &str, mfa_token: Option<&str>, browser: &[&str]) -> Result<()> {
    let mut args = vec!["login", alias];
    if let Some(token) = mfa_token {
        args.extend(["--mfa-token", token]);
    }
    args.push("--stdout");
    debug!("aws-vault {}", args.join(" "));

    let mut producer = Command::new("aws-vault")
        .args(&args)
        .stdout(Stdio::piped())
        .spawn()
        .context("Failed to run aws-vault, is it installed?")?;
    let pipe = producer
        .stdout
        .take()
        .context("Failed to open aws-vault stdout")?;

    let mut consumer = Command::new("xargs")
        .arg("-t")
        .args(browser)
        .stdin(Stdio::from(pipe))
        .spawn()
        .context("Failed to run xargs")?;

    let reaper = thread::spawn(move || {
        let _ = producer.wait();
    });
    let status = consumer.wait().context("Failed to wait for the browser launch")?;
    let _ = reaper.join();
    ensure!(status.success(), "Browser launch exited with {status}");
    Ok(())
}

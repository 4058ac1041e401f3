//! Version reporting and minimum-version gating for the wrapped tools.

use std::process::Command;

use anyhow::{Context, Result, bail, ensure};
use semver::Version;

/// Oldest `op` release whose `signin`/`get` surface this tool understands.
pub const MIN_VERSION_OP: &str = "1.11.4";
/// Oldest `aws-vault` release with `login --stdout`.
pub const MIN_VERSION_AWS_VAULT: &str = "6.0.0";

/// Returns the full version string, including the runtime os and arch.
pub fn full() -> String {
    format!(
        "v{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Runs `program --version` and fails unless the reported version is at
/// least `min`.
///
/// Both stdout and stderr are considered since `aws-vault` reports its
/// version on stderr.
pub fn require_min_version(program: &str, min: &str) -> Result<()> {
    let output = Command::new(program)
        .arg("--version")
        .output()
        .with_context(|| format!("Unable to call version command for {program:?}"))?;
    let mut reported = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if reported.is_empty() {
        reported = String::from_utf8_lossy(&output.stderr).trim().to_string();
    }
    ensure!(
        !reported.is_empty(),
        "No output returned for version command for {program:?}"
    );
    if !version_at_least(&reported, min)? {
        bail!("Expected version of {program:?} to be greater or equal to {min:?}, got {reported:?}");
    }
    Ok(())
}

/// Compares two version strings with semver ordering, tolerating a leading
/// `v` on either side.
fn version_at_least(actual: &str, min: &str) -> Result<bool> {
    let actual = Version::parse(actual.trim_start_matches('v'))
        .with_context(|| format!("Unable to parse version {actual:?}"))?;
    let min = Version::parse(min.trim_start_matches('v'))
        .with_context(|| format!("Unable to parse version {min:?}"))?;
    Ok(actual >= min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_patch_release_is_rejected() {
        assert!(!version_at_least("1.11.3", "1.11.4").unwrap());
    }

    #[test]
    fn equal_version_is_accepted() {
        assert!(version_at_least("1.11.4", "1.11.4").unwrap());
    }

    #[test]
    fn newer_version_is_accepted() {
        assert!(version_at_least("2.0.0", "1.11.4").unwrap());
    }

    #[test]
    fn leading_v_is_tolerated() {
        assert!(version_at_least("v6.3.1", "6.0.0").unwrap());
        assert!(version_at_least("6.3.1", "v6.0.0").unwrap());
    }

    #[test]
    fn junk_is_an_error() {
        assert!(version_at_least("not-a-version", "1.0.0").is_err());
    }

    #[test]
    fn full_version_has_v_prefix_and_platform() {
        let full = full();
        assert!(full.starts_with('v'));
        assert!(full.contains('/'));
    }
}

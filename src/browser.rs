//! Browser selection and launching.
//!
//! Each supported browser maps to a fixed local application command line. The
//! sign-in URL is appended as the final argument when opening directly; the
//! same command line doubles as the `xargs` target for the pipe strategy.

use std::process::Command;

use anyhow::{Context, Result};
use clap::ValueEnum;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Browser {
    Chrome,
    ChromeIncognito,
    ChromeCanary,
    Safari,
    Firefox,
}

const CHROME: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "--new-window",
];
const CHROME_INCOGNITO: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "--new-window",
    "--args",
    "--incognito",
];
const CHROME_CANARY: &[&str] = &[
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    "--new-window",
];
const SAFARI: &[&str] = &[
    "/usr/bin/open",
    "-a",
    "/Applications/Safari.app/Contents/MacOS/Safari",
];
const FIREFOX: &[&str] = &["/Applications/Firefox.app/Contents/MacOS/firefox"];

impl Browser {
    /// The command line used to launch this browser, program first.
    pub fn command(&self) -> &'static [&'static str] {
        match self {
            Browser::Chrome => CHROME,
            Browser::ChromeIncognito => CHROME_INCOGNITO,
            Browser::ChromeCanary => CHROME_CANARY,
            Browser::Safari => SAFARI,
            Browser::Firefox => FIREFOX,
        }
    }

    /// Opens `url` in this browser. The browser process is left running; only
    /// the spawn itself is checked.
    pub fn open(&self, url: &str) -> Result<()> {
        let command = self.command();
        Command::new(command[0])
            .args(&command[1..])
            .arg(url)
            .spawn()
            .with_context(|| format!("Failed to launch browser {:?}", command[0]))?;
        Ok(())
    }
}

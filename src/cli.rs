//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};

use crate::browser::Browser;

/// Log into AWS using credentials stored in 1Password.
#[derive(Parser)]
#[command(name = "awslogin", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Log into the AWS console
    Login(LoginArgs),
    /// Sign in to 1Password and refresh the cached session
    OpSignin(SessionArgs),
    /// Print version information
    Version,
}

#[derive(Args)]
pub struct LoginArgs {
    /// Title substrings; items matching any of them are kept
    pub filters: Vec<String>,

    /// The browser to open the console with
    #[arg(short, long, env = "AWSLOGIN_BROWSER", value_enum, default_value_t = Browser::Chrome)]
    pub browser: Browser,

    /// The 1Password section name used to identify AWS credentials
    #[arg(long, env = "AWSLOGIN_SECTION_NAME", default_value = "ACCOUNT_INFO")]
    pub section_name: String,

    /// The 1Password field title used to identify the AWS account alias
    #[arg(long, env = "AWSLOGIN_FIELD_TITLE", default_value = "ACCOUNT_ALIAS")]
    pub field_title: String,

    /// Mint the sign-in URL in process instead of piping `aws-vault login`
    /// into the browser
    #[arg(long, env = "AWSLOGIN_FEDERATION")]
    pub federation: bool,

    /// Use verbose output
    #[arg(short, long, env = "AWSLOGIN_VERBOSE")]
    pub verbose: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args)]
pub struct SessionArgs {
    /// The directory holding the session file [default: home directory]
    #[arg(long, env = "AWSLOGIN_SESSION_DIRECTORY")]
    pub session_directory: Option<PathBuf>,

    /// The name of the file that retains session information
    #[arg(long, env = "AWSLOGIN_SESSION_FILENAME", default_value = ".op_session")]
    pub session_filename: String,
}

impl SessionArgs {
    /// Resolves the full path of the 1Password session file, defaulting the
    /// directory to the user's home directory.
    pub fn path(&self) -> Result<PathBuf> {
        let directory = match &self.session_directory {
            Some(directory) => directory.clone(),
            None => dirs::home_dir().context("Could not determine home directory")?,
        };
        ensure!(
            directory.is_dir(),
            "The session directory {:?} does not exist",
            directory
        );
        ensure!(
            !self.session_filename.is_empty(),
            "The session filename should not be empty"
        );
        Ok(directory.join(&self.session_filename))
    }
}

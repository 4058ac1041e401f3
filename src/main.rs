//! AWS console login via 1Password.
//!
//! This program automates logging into the AWS console using credentials
//! brokered through the 1Password CLI and aws-vault:
//! 1. Reuses a cached 1Password session token, signing in again when the CLI
//!    rejects it
//! 2. Lists items tagged `aws`, filters them by title and lets the operator
//!    pick an account
//! 3. Extracts the account alias and a one-time password from the chosen item
//! 4. Opens a console sign-in URL in a browser, either through an
//!    `aws-vault login` pipe or by minting a federation URL in process

use std::env;
use std::io;
use std::process;

use anyhow::{Result, ensure};
use clap::Parser;
use log::debug;

mod browser;
mod cli;
mod federation;
mod item;
mod op;
mod vault;
mod version;

use cli::{Cli, Command, LoginArgs};
use op::Op;

/// Tag that marks 1Password login items as AWS accounts.
const ITEM_TAGS: &str = "aws";

#[tokio::main]
async fn main() {
    // INFO by default; RUST_LOG overrides. Prompts and account listings go
    // straight to stdout, not through the logger.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("awslogin: {err:#}");
        eprintln!("Try awslogin --help for more information.");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Login(args) => login(args).await,
        Command::OpSignin(args) => op::signin(&args.path()?).map(|_| ()),
        Command::Version => {
            println!("awslogin version {}", version::full());
            Ok(())
        }
    }
}

/// The full login flow, from account selection to the browser launch.
async fn login(args: LoginArgs) -> Result<()> {
    version::require_min_version("op", version::MIN_VERSION_OP)?;
    if !args.federation {
        version::require_min_version("aws-vault", version::MIN_VERSION_AWS_VAULT)?;
    }
    let session_path = args.session.path()?;

    // AWS_PROFILE short-circuits account selection. With filters given it is
    // demoted to one more filter so selection still runs.
    let mut account_alias = env::var("AWS_PROFILE").unwrap_or_default();
    let mut filters = args.filters.clone();
    if !filters.is_empty() && !account_alias.is_empty() {
        filters.push(std::mem::take(&mut account_alias));
    }

    let mut op_client: Option<Op> = None;
    let mut title = String::new();
    if account_alias.is_empty() {
        let op = op::check_session(&session_path)?;
        (title, account_alias) =
            choose_account_alias(&op, &args.section_name, &args.field_title, &filters)?;
        op_client = Some(op);
    }
    if args.verbose {
        println!("Account Alias: {account_alias}");
    }

    if args.federation {
        let url = federation::login_url(&account_alias).await?;
        return args.browser.open(&url);
    }

    // A still-active aws-vault session needs no fresh MFA code.
    let sessions = vault::sessions().unwrap_or_default();
    let active = sessions
        .get(&account_alias)
        .is_some_and(|remaining| *remaining > 0);
    let mfa_token = if active {
        debug!("Reusing active aws-vault session for {account_alias}");
        None
    } else {
        let op = match op_client {
            Some(op) => op,
            None => op::check_session(&session_path)?,
        };
        if title.is_empty() {
            // Alias came from AWS_PROFILE, reconstruct the item title
            title = format!("AWS {account_alias}");
        }
        let totp = op.totp(&title)?;
        if args.verbose {
            println!("MFA Token: {totp}");
        }
        Some(totp)
    };
    vault::login_via_pipe(&account_alias, mfa_token.as_deref(), args.browser.command())
}

/// Lists the tagged 1Password items, lets the operator pick one and extracts
/// its account alias. Returns the item title alongside the alias since the
/// title is needed again for the TOTP lookup.
fn choose_account_alias(
    op: &Op,
    section_name: &str,
    field_title: &str,
    filters: &[String],
) -> Result<(String, String)> {
    let items = op.list_items(ITEM_TAGS)?;
    let items = item::filter_items(items, filters);
    let stdin = io::stdin();
    let chosen = item::choose(&items, filters, stdin.lock(), io::stdout())?;
    let title = chosen.overview.title.clone();

    let detailed = op.get_item(&title)?;
    let alias = detailed
        .account_alias(section_name, field_title)
        .unwrap_or_default();
    let alias = alias.trim();
    ensure!(
        !alias.is_empty(),
        "There is no account alias defined for the choice {title:?}"
    );
    Ok((title, alias.to_string()))
}

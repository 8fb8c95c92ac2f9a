//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::{Confirm, Password};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bootstrap::{AttemptOutcome, Bootstrapper, LoadStage, TracingNavigator};
use crate::config::Config;
use crate::credential::{classify, CredentialKind};
use crate::error::Error;

use super::backend::OfflineInitializer;

fn bootstrapper(config: &Config) -> Bootstrapper {
    Bootstrapper::from_config(
        config,
        Arc::new(OfflineInitializer),
        Arc::new(TracingNavigator),
    )
}

/// Read setup input from the argument or a hidden prompt
fn read_input(input: Option<String>) -> Result<String> {
    match input {
        Some(input) => Ok(input),
        None => Password::new()
            .with_prompt("Mnemonic, private key or address (empty to create a new wallet)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read setup input"),
    }
}

/// Print the claimed kind of an input without echoing it
pub fn classify_command(input: Option<String>) -> Result<()> {
    let input = read_input(input)?;
    let kind = classify(&input);

    match kind {
        CredentialKind::Unrecognized => {
            println!("Unrecognized input - setup would create a new wallet");
        }
        kind => {
            println!("Claimed kind: {} ({})", kind.label(), kind);
            if kind.is_watch_only() {
                println!("Watch-only: this wallet cannot sign transactions");
            } else if kind.is_private_key() {
                println!("Single private key: there is no seed phrase to back up");
            }
        }
    }

    Ok(())
}

/// Set up the wallet from user input
pub async fn setup(config: &Config, input: Option<String>) -> Result<()> {
    let machine = bootstrapper(config);

    if machine.has_record() {
        println!("Wallet is already set up. Run `reset` first to replace it.");
        return Ok(());
    }

    let input = read_input(input)?;
    let outcome = machine.setup(&input).await?;

    match outcome {
        AttemptOutcome::Ready => {
            println!("\nWallet ready.");
            if let Some(record) = machine.record() {
                println!("Type: {}", record.kind.label());
                println!("Value: {}", record.preview());
            }
            if let Some(error) = machine.error() {
                warn!("Setup finished with a warning: {}", error);
            }
            Ok(())
        }
        AttemptOutcome::Failed(e) => {
            Err(Error::Initialization(e)).context("Wallet initialization failed")
        }
        AttemptOutcome::NotPersisted(e) => {
            Err(Error::Storage(e)).context("Could not save credential")
        }
        AttemptOutcome::Superseded | AttemptOutcome::NeedsSetup => {
            anyhow::bail!("Setup did not complete")
        }
    }
}

/// Show bootstrap status
pub async fn status(config: &Config) -> Result<()> {
    let machine = bootstrapper(config);
    machine.start().await;
    let state = machine.state();

    println!("\n=== WALLET STATUS ===\n");
    println!("Stage: {}", state.stage);

    match machine.record() {
        Some(record) => {
            println!("Type: {}", record.kind.label());
            println!("Value: {}", record.preview());
        }
        None => println!("No wallet configured. Run `setup` to create or import one."),
    }

    if let Some(error) = state.error {
        println!("\nError: {}", error.message);
        println!("  during: {}", error.occurred_during);
        println!("  at: {}", error.occurred_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if state.stage == LoadStage::SettingUp {
        println!("\nSetup is incomplete. Run `status` again to retry.");
    }

    Ok(())
}

/// Forget the stored wallet
pub fn reset(config: &Config, force: bool) -> Result<()> {
    if !force {
        let prompt = if config.flags.reset_clears_all_storage {
            "Delete the wallet and ALL stored data? This cannot be undone."
        } else {
            "Delete the stored wallet? This cannot be undone."
        };

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Reset cancelled by user");
            return Ok(());
        }
    }

    bootstrapper(config)
        .reset()
        .context("Failed to clear wallet storage")?;

    println!("Wallet removed.");
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Sevis Wallet CLI
//!
//! Entry point for the `sevis` binary. Opens the encrypted wallet in the
//! data directory and runs one identity operation against it:
//!
//! - `register` — generate the device key, DID and membership credential
//! - `status`   — is this device registered?
//! - `show`     — DID document and membership credential
//! - `verify`   — verify a credential offline
//! - `delete`   — remove the registration and everything tied to it
//! - `version`  — print build version information
//!
//! Command output is JSON on stdout; logs go to stderr.

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use rand::RngCore;
use std::io::{BufRead, Read, Write};
use std::path::Path;
use std::sync::Arc;

use sevis_identity::config::{IdentityConfig, MembershipIssuer, DEVICE_SECRET_LENGTH};
use sevis_identity::context::WalletContext;
use sevis_identity::registration::{PersonalInfo, SecurityPreferences, UserPresence};
use sevis_identity::timestamp;

use cli::{Commands, SevisCli};

/// File inside the data directory holding the hex-encoded device secret.
const DEVICE_SECRET_FILE: &str = "device.key";

/// Sled directory inside the data directory.
const STORE_DIR: &str = "store";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SevisCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);

    let mut config = IdentityConfig {
        default_key_type: cli.key_type,
        ..Default::default()
    };
    if let Commands::Register(args) = &cli.command {
        if args.self_issued {
            config.membership_issuer = MembershipIssuer::SelfIssued;
        }
    }

    let ctx = open_wallet(&cli.data_dir, config)?;
    let outcome = run(&ctx, cli.command).await;
    ctx.shutdown().context("failed to flush wallet store")?;

    match outcome? {
        true => Ok(()),
        false => std::process::exit(1),
    }
}

/// Runs one command. `Ok(false)` means the command completed but the answer
/// was negative (an invalid credential), which maps to exit status 1.
async fn run(ctx: &WalletContext, command: Commands) -> Result<bool> {
    match command {
        Commands::Register(args) => {
            let mut info = PersonalInfo::new(args.first_name, args.last_name, args.email);
            info.date_of_birth = args.date_of_birth;
            info.phone_number = args.phone_number;
            let device_id = args
                .device_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let prefs = SecurityPreferences::new(args.biometric, device_id);

            let record = ctx.registration().register(info, prefs).await?;
            print_json(&serde_json::json!({
                "did": record.did,
                "keyId": record.key_id,
                "credentialId": record.credential_id,
                "walletId": record.wallet_id,
                "registeredAt": timestamp::format(&record.registered_at),
            }))?;
        }
        Commands::Status => {
            print_json(&ctx.registration().check_status()?)?;
        }
        Commands::Show => {
            let Some(identity) = ctx.registration().current_identity()? else {
                bail!("wallet is not registered; run `sevis register` first");
            };
            let document = ctx.identifiers().document(&identity.record.did).await?;
            print_json(&serde_json::json!({
                "didDocument": document,
                "credential": identity.credential,
            }))?;
        }
        Commands::Verify(args) => {
            let result = match args.credential {
                Some(path) => {
                    let json = read_credential(&path)?;
                    ctx.verifier().verify_json(&json).await
                }
                None => ctx.registration().verify_membership().await?,
            };
            print_json(&result)?;
            return Ok(result.is_valid());
        }
        Commands::Delete(args) => {
            if !args.yes && !confirm_on_terminal("Delete this wallet's identity and credentials?") {
                bail!("aborted");
            }
            ctx.registration().delete_registration().await?;
            print_json(&ctx.registration().check_status()?)?;
        }
        Commands::Version => print_version(),
    }
    Ok(true)
}

/// Opens the encrypted wallet, creating the directory and device secret on
/// first use.
fn open_wallet(data_dir: &Path, config: IdentityConfig) -> Result<WalletContext> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let secret = load_or_create_device_secret(&data_dir.join(DEVICE_SECRET_FILE))?;
    let store_path = data_dir.join(STORE_DIR);
    let ctx = WalletContext::open(&store_path, &secret, config, Arc::new(TerminalPresence))
        .with_context(|| format!("failed to open wallet at {}", store_path.display()))?;

    tracing::debug!(data_dir = %data_dir.display(), "wallet opened");
    Ok(ctx)
}

fn load_or_create_device_secret(path: &Path) -> Result<[u8; DEVICE_SECRET_LENGTH]> {
    if path.exists() {
        let encoded = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read device secret {}", path.display()))?;
        let bytes = hex::decode(encoded.trim()).context("device secret is not valid hex")?;
        let secret: [u8; DEVICE_SECRET_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
            anyhow::anyhow!(
                "device secret must be {DEVICE_SECRET_LENGTH} bytes, found {}",
                b.len()
            )
        })?;
        return Ok(secret);
    }

    let mut secret = [0u8; DEVICE_SECRET_LENGTH];
    rand::rngs::OsRng
        .try_fill_bytes(&mut secret)
        .context("OS random source unavailable")?;
    std::fs::write(path, hex::encode(secret))
        .with_context(|| format!("failed to write device secret to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "generated device secret");
    Ok(secret)
}

fn read_credential(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut json = String::new();
        std::io::stdin()
            .read_to_string(&mut json)
            .context("failed to read credential from stdin")?;
        return Ok(json);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credential {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Stands in for the platform biometric prompt: a y/N question on stderr.
struct TerminalPresence;

#[async_trait]
impl UserPresence for TerminalPresence {
    async fn confirm(&self, reason: &str) -> bool {
        let reason = reason.to_string();
        tokio::task::spawn_blocking(move || confirm_on_terminal(&reason))
            .await
            .unwrap_or(false)
    }
}

fn confirm_on_terminal(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    if std::io::stderr().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn print_version() {
    println!("sevis  {}", env!("CARGO_PKG_VERSION"));
    println!("rustc  {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_secret_is_created_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEVICE_SECRET_FILE);
        let first = load_or_create_device_secret(&path).unwrap();
        let second = load_or_create_device_secret(&path).unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn short_device_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEVICE_SECRET_FILE);
        std::fs::write(&path, "abcd").unwrap();
        assert!(load_or_create_device_secret(&path).is_err());
    }

    #[tokio::test]
    async fn register_then_status_through_the_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = open_wallet(dir.path(), IdentityConfig::default()).unwrap();
        let ok = run(
            &ctx,
            Commands::Register(cli::RegisterArgs {
                first_name: "Ana".into(),
                last_name: "Lee".into(),
                email: "ana@example.com".into(),
                date_of_birth: None,
                phone_number: None,
                biometric: false,
                device_id: Some("test-device".into()),
                self_issued: false,
            }),
        )
        .await
        .unwrap();
        assert!(ok);
        assert!(ctx.registration().check_status().unwrap().registered);
        assert!(run(&ctx, Commands::Verify(cli::VerifyArgs { credential: None }))
            .await
            .unwrap());
        ctx.shutdown().unwrap();
    }
}

//! # CLI Interface
//!
//! Argument structure for the `sevis` binary, via `clap` derive. Global
//! flags pick the wallet directory and log format; subcommands map onto
//! the registration orchestrator's operations.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use sevis_identity::crypto::KeyType;

use crate::logging::LogFormat;

/// Sevis wallet identity tool.
///
/// Registers this device, shows its decentralized identifier and
/// membership credential, and verifies credentials offline.
#[derive(Parser, Debug)]
#[command(
    name = "sevis",
    about = "Sevis wallet identity tool",
    version,
    propagate_version = true
)]
pub struct SevisCli {
    /// Wallet directory. Holds the encrypted store and the device secret.
    #[arg(
        long,
        short = 'd',
        env = "SEVIS_DATA_DIR",
        default_value = ".sevis",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Log output format. Logs go to stderr.
    #[arg(long, value_enum, env = "SEVIS_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Key algorithm for the device key generated at registration.
    #[arg(long, env = "SEVIS_KEY_TYPE", default_value = "ed25519", global = true)]
    pub key_type: KeyType,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register this device and issue its membership credential.
    Register(RegisterArgs),
    /// Report whether this device is registered.
    Status,
    /// Print the DID document and membership credential.
    Show,
    /// Verify a credential file, or the stored membership credential.
    Verify(VerifyArgs),
    /// Delete the registration, its key and every credential naming it.
    Delete(DeleteArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub email: String,

    /// YYYY-MM-DD.
    #[arg(long)]
    pub date_of_birth: Option<String>,

    #[arg(long)]
    pub phone_number: Option<String>,

    /// Ask for confirmation on the terminal before signing.
    #[arg(long)]
    pub biometric: bool,

    /// Device identifier recorded with the security preferences. A random
    /// one is used when omitted.
    #[arg(long, env = "SEVIS_DEVICE_ID")]
    pub device_id: Option<String>,

    /// Sign the membership credential as its own issuer instead of the
    /// placeholder issuer.
    #[arg(long)]
    pub self_issued: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Credential JSON file. `-` reads stdin.
    pub credential: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

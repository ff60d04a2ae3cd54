use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Operator tooling for Warden: policy checks, device approvals and sessions"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "WARDEN_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate catalog policies for a caller/callee pair
    Policy(PolicyArgs),
    /// Answer a pending device approval
    Otp(OtpArgs),
    /// Session administration
    Session(SessionArgs),
    /// API key helpers for the catalog
    Key(KeyArgs),
    /// Load the gateway configuration, catalog and database and report
    Doctor(DoctorArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "WARDEN_DB_PATH", default_value = "warden.db")]
    pub db: PathBuf,
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub cmd: PolicySub,
}

#[derive(Subcommand, Debug)]
pub enum PolicySub {
    Check(PolicyCheckArgs),
}

#[derive(Args, Debug)]
pub struct PolicyCheckArgs {
    #[arg(long, env = "WARDEN_CATALOG", default_value = "warden.yaml")]
    pub catalog: PathBuf,
    /// Calling app id
    #[arg(long)]
    pub caller: String,
    /// Callee app id
    #[arg(long)]
    pub callee: String,
    /// Tool name (required when the callee is an MCP server)
    #[arg(long, default_value = "")]
    pub tool: String,
    /// Print the decision as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct OtpArgs {
    #[command(subcommand)]
    pub cmd: OtpSub,
}

#[derive(Subcommand, Debug)]
pub enum OtpSub {
    Approve(OtpAnswerArgs),
    Deny(OtpAnswerArgs),
}

#[derive(Args, Debug)]
pub struct OtpAnswerArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub device: String,
    #[arg(long)]
    pub session: String,
    /// OTP value as delivered to the device
    #[arg(long, env = "WARDEN_OTP_VALUE", hide_env_values = true)]
    pub value: String,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub cmd: SessionSub,
}

#[derive(Subcommand, Debug)]
pub enum SessionSub {
    Expire(SessionExpireArgs),
}

#[derive(Args, Debug)]
pub struct SessionExpireArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub cmd: KeySub,
}

#[derive(Subcommand, Debug)]
pub enum KeySub {
    /// Print the SHA-256 digest to store in the catalog
    Hash { key: String },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {}

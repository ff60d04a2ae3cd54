use crate::cli::args::OtpAnswerArgs;
use crate::exit_codes::{DENIED, SUCCESS};
use anyhow::Context;
use std::sync::Arc;
use warden_core::{
    ApprovalConfig, OsSecretSource, OtpStateMachine, SqliteStore, StatusCode,
    SystemClock,
};

/// Answer a pending approval as the device would.
pub fn cmd_answer(args: OtpAnswerArgs, approve: bool) -> anyhow::Result<i32> {
    let store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("failed to open database {}", args.store.db.display()))?;
    let otps = OtpStateMachine::new(
        Arc::new(store),
        Arc::new(SystemClock),
        Arc::new(OsSecretSource),
        ApprovalConfig::default(),
    );

    match otps.respond(&args.device, &args.session, &args.value, approve) {
        Ok(otp) => {
            println!(
                "{} OTP {} for session {}",
                if approve { "approved" } else { "denied" },
                otp.id,
                otp.session_id
            );
            Ok(SUCCESS)
        }
        Err(e) if e.code() != StatusCode::Internal => {
            eprintln!("rejected ({}): {}", e.reason_code(), e);
            Ok(DENIED)
        }
        Err(e) => Err(e).context("OTP update failed"),
    }
}

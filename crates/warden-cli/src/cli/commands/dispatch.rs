use super::super::args::*;
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Policy(args) => match args.cmd {
            PolicySub::Check(check) => super::policy::cmd_check(check),
        },
        Command::Otp(args) => match args.cmd {
            OtpSub::Approve(answer) => super::otp::cmd_answer(answer, true),
            OtpSub::Deny(answer) => super::otp::cmd_answer(answer, false),
        },
        Command::Session(args) => match args.cmd {
            SessionSub::Expire(expire) => super::session::cmd_expire(expire),
        },
        Command::Key(args) => match args.cmd {
            KeySub::Hash { key } => Ok(super::key::cmd_hash(&key)),
        },
        Command::Doctor(args) => super::doctor::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

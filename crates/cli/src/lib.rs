pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;
use tender_core::config::{AppConfig, LoadOptions};

use commands::award::AwardAction;

#[derive(Debug, Parser)]
#[command(
    name = "tender",
    about = "Tender RFQ operator CLI",
    long_about = "Apply migrations, inspect configuration, rank quotations and run award operations against the RFQ database.",
    after_help = "Examples:\n  tender migrate\n  tender rank --request REQ-1 --quality SUP-1=80\n  tender revoke --request REQ-1 --manager mgr-7 --reason \"missed delivery\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Rank the active quotations of a request with the configured weights")]
    Rank {
        #[arg(long = "request", help = "Procurement request id")]
        request_id: String,
        #[arg(
            long = "quality",
            value_parser = commands::rank::parse_quality_score,
            help = "Supplier quality score as SUPPLIER=SCORE (0..=100), repeatable"
        )]
        quality: Vec<(String, Decimal)>,
    },
    #[command(about = "Award a request to a submitted quotation and reject the others")]
    Select {
        #[arg(long = "request")]
        request_id: String,
        #[arg(long = "quotation")]
        quotation_id: String,
        #[arg(long = "requester", help = "User notified of the selection")]
        requester_id: String,
    },
    #[command(about = "Revoke the current winner as a penalty and reopen the request")]
    Revoke {
        #[arg(long = "request")]
        request_id: String,
        #[arg(long = "manager")]
        manager_id: String,
        #[arg(long)]
        reason: String,
    },
    #[command(about = "Award a revoked request to a replacement quotation")]
    Reselect {
        #[arg(long = "request")]
        request_id: String,
        #[arg(long = "quotation")]
        quotation_id: String,
        #[arg(long = "manager")]
        manager_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Rank { request_id, quality } => commands::rank::run(&request_id, &quality),
        Command::Select { request_id, quotation_id, requester_id } => {
            commands::award::run(AwardAction::Select { request_id, quotation_id, requester_id })
        }
        Command::Revoke { request_id, manager_id, reason } => {
            commands::award::run(AwardAction::Revoke { request_id, manager_id, reason })
        }
        Command::Reselect { request_id, quotation_id, manager_id } => {
            commands::award::run(AwardAction::Reselect { request_id, quotation_id, manager_id })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use spark_driver::SparkDriver;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webln_bridge::{
    build_controller, BridgeConfig, BridgeError, HeadlessPage, PageSession, TerminalPrompt,
};
use webln_controller::{ApproveAll, Controller, Operation, PromptSurface};
use webln_core::{InvoiceOptions, TabId};

#[derive(Debug, Parser)]
#[command(name = "webln-bridge")]
#[command(about = "WebLN wallet bridge for a lightningd spark backend")]
struct Cli {
    /// Authorization store file. Falls back to BRIDGE_AUTH_STORE env.
    #[arg(long, global = true)]
    auth_store: Option<PathBuf>,

    /// Approve every prompt without asking
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Node identity
    Info,
    /// Balance and recent transactions
    Summary,
    /// Decode an invoice
    Decode { invoice: String },
    /// Pay an invoice
    Pay {
        invoice: String,
        /// Amount in satoshi, for invoices without one
        #[arg(long)]
        amount: Option<u64>,
        /// Label stored with the payment
        #[arg(long)]
        label: Option<String>,
    },
    /// Create an invoice
    Invoice {
        /// Amount in satoshi
        amount: u64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Print incoming payments until interrupted
    Listen,
    /// Manage domain authorizations
    #[command(subcommand)]
    Domains(DomainsCommand),
    /// Run a WebLN call the way a page on DOMAIN would
    Webln {
        #[arg(long)]
        domain: String,
        /// Page title shown in prompts
        #[arg(long)]
        title: Option<String>,
        #[command(subcommand)]
        call: WeblnCall,
    },
}

#[derive(Debug, Subcommand)]
enum DomainsCommand {
    List,
    Grant { domain: String },
    Revoke { domain: String },
    Block { domain: String },
}

#[derive(Debug, Subcommand)]
enum WeblnCall {
    Enable,
    GetInfo,
    SendPayment {
        invoice: String,
    },
    MakeInvoice {
        /// Fixed amount in satoshi
        amount: Option<u64>,
        #[arg(long)]
        minimum: Option<u64>,
        #[arg(long)]
        maximum: Option<u64>,
        #[arg(long)]
        default_amount: Option<u64>,
        #[arg(long)]
        memo: Option<String>,
    },
    Blocked,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::from_env();
    if let Some(path) = cli.auth_store.clone() {
        config = config.with_auth_store(path);
    }

    let prompt: Arc<dyn PromptSurface> = if cli.yes {
        Arc::new(ApproveAll)
    } else {
        Arc::new(TerminalPrompt::new())
    };
    let controller = Arc::new(build_controller(&config, prompt).await?);

    run(cli.command, controller, &config).await?;
    Ok(())
}

async fn run(
    command: Command,
    controller: Arc<Controller<SparkDriver>>,
    config: &BridgeConfig,
) -> Result<(), BridgeError> {
    match command {
        Command::Info => print_json(&controller.rpc(Operation::Info).await?),
        Command::Summary => print_json(&controller.rpc(Operation::Summary).await?),
        Command::Decode { invoice } => {
            print_json(&controller.rpc(Operation::Decode { invoice }).await?)
        }
        Command::Pay {
            invoice,
            amount,
            label,
        } => {
            let operation = Operation::Pay {
                invoice,
                amount_msat: amount.map(|sat| sat.saturating_mul(1000)),
                description: label,
            };
            print_json(&controller.rpc(operation).await?)
        }
        Command::Invoice {
            amount,
            description,
        } => {
            let operation = Operation::MakeInvoice {
                amount,
                description,
                minimum: None,
                maximum: None,
            };
            print_json(&controller.rpc(operation).await?)
        }
        Command::Listen => listen(&controller).await,
        Command::Domains(command) => domains(&controller, command).await,
        Command::Webln {
            domain,
            title,
            call,
        } => {
            let mut page = HeadlessPage::new(domain);
            if let Some(title) = title {
                page = page.with_title(title);
            }
            let session =
                PageSession::open(controller.clone(), TabId(1), page, config.relay.clone()).await;
            let webln = &session.provider;

            let result = match call {
                WeblnCall::Enable => webln.enable().await.map(|_| json!({"enabled": true})),
                WeblnCall::GetInfo => webln.get_info().await.map(|r| json!(r)),
                WeblnCall::SendPayment { invoice } => {
                    webln.send_payment(invoice).await.map(|r| json!(r))
                }
                WeblnCall::MakeInvoice {
                    amount,
                    minimum,
                    maximum,
                    default_amount,
                    memo,
                } => {
                    let options = InvoiceOptions {
                        amount,
                        minimum_amount: minimum,
                        maximum_amount: maximum,
                        default_amount,
                        default_memo: memo,
                    };
                    webln.make_invoice(options).await.map(|r| json!(r))
                }
                WeblnCall::Blocked => webln.is_blocked().await.map(|b| json!({"blocked": b})),
            };

            let pasted = session.relay.page().pasted();
            if !pasted.is_empty() {
                info!("Page received {}", pasted);
            }
            session.close().await;
            print_json(&result?)
        }
    }
}

async fn listen(controller: &Controller<SparkDriver>) -> Result<(), BridgeError> {
    let mut events = controller.payment_events();
    let handle = controller.watch_payments().await?;
    info!("Listening for payments, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_json(&serde_json::to_value(&event)?)?,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    info!("Skipped {} payment events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    handle.close().await;
    Ok(())
}

async fn domains(
    controller: &Controller<SparkDriver>,
    command: DomainsCommand,
) -> Result<(), BridgeError> {
    match command {
        DomainsCommand::List => {
            let authorized: Vec<Value> = controller
                .authorized_domains()
                .await?
                .into_iter()
                .map(|(domain, entry)| json!({"domain": domain, "entry": entry}))
                .collect();
            let blocked = controller.store().blocked_domains().await?;
            print_json(&json!({"authorized": authorized, "blocked": blocked}))
        }
        DomainsCommand::Grant { domain } => print_json(&json!(controller.grant(&domain).await?)),
        DomainsCommand::Revoke { domain } => {
            print_json(&json!({"revoked": controller.revoke(&domain).await?}))
        }
        DomainsCommand::Block { domain } => {
            controller.block(&domain).await?;
            print_json(&json!({"blocked": domain}))
        }
    }
}

fn print_json(value: &Value) -> Result<(), BridgeError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

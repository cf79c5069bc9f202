mod call_args;
mod config;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use alloy_primitives::{Address, B256, U256};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use funding::{
    cycle::{risk_flags, warning_text},
    deploy::{DeployEvent, ProjectDeployer, ProjectDraft},
    rewards::{convert_request, redeem_request, RewardsWatch},
    wad::{format_wad, parse_wad},
};
use ledger_client::{
    abi::{encode_call, AbiDecode},
    metadata::PinningClient,
    provider::ReadEndpoint,
    reader::{RefreshTrigger, StateReader},
    rpc::RpcProvider,
    transactor::{TransactionRequest, Transactor, TxLifecycle, TxObserver},
};
use shared::domain::{Endpoint, ProjectId};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    call_args::{parse_call_arg, resolve_endpoint, Rendered, ReturnKind},
    config::{load_settings, Settings, DEFAULT_CONFIG_PATH},
};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "funding-cli", about = "Read and act on funding protocol projects")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a value once.
    Read {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        operation: String,
        /// Typed argument, e.g. `uint256:1` (repeatable).
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long, value_enum, default_value_t = ReturnKind::Uint256)]
        returns: ReturnKind,
    },
    /// Follow a value, printing every change until interrupted.
    Watch {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        operation: String,
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long, value_enum, default_value_t = ReturnKind::Uint256)]
        returns: ReturnKind,
        /// Event signature on the same contract that triggers a re-read (repeatable).
        #[arg(long = "event")]
        events: Vec<String>,
        #[arg(long)]
        poll_ms: Option<u64>,
    },
    /// Redeem tickets for a share of the project's overflow.
    Redeem {
        #[arg(long)]
        project: u64,
        /// Ticket amount as a decimal, e.g. `12.5`.
        #[arg(long)]
        amount: String,
        /// Minimum overflow to accept; computed from the bonding curve if omitted.
        #[arg(long)]
        min_return: Option<String>,
        /// The project's ticket token, if issued.
        #[arg(long)]
        ticket: Option<Address>,
        #[arg(long)]
        beneficiary: Option<Address>,
    },
    /// Convert staked tickets into the project's ERC-20 tokens.
    Convert {
        #[arg(long)]
        project: u64,
    },
    /// Upload project metadata and deploy a new project.
    Deploy {
        /// JSON project draft.
        #[arg(long)]
        draft: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let settings = load_settings(&args.config)?;
    let provider = Arc::new(
        RpcProvider::connect(&settings.rpc_url, settings.provider_config())
            .with_context(|| format!("invalid rpc url '{}'", settings.rpc_url))?,
    );
    info!(
        "cli: rpc={} account={:?} contracts={}",
        settings.rpc_url,
        settings.account,
        settings.contracts.len()
    );

    match args.command {
        Command::Read {
            contract,
            operation,
            args,
            returns,
        } => read_once(&settings, &provider, &contract, &operation, &args, returns).await,
        Command::Watch {
            contract,
            operation,
            args,
            returns,
            events,
            poll_ms,
        } => {
            let endpoint = resolve_endpoint(&settings.contracts()?, &contract)?;
            let call_args = parse_all(&args)?;
            let triggers = events
                .iter()
                .map(|event| RefreshTrigger::new(&endpoint, event.as_str()))
                .collect::<Vec<_>>();
            let poll = poll_ms.map(Duration::from_millis);
            let watch = WatchSpec {
                endpoint,
                operation,
                args: call_args,
                triggers,
                poll,
            };
            match returns {
                ReturnKind::Uint256 => follow(watch, &provider, Rendered::Uint).await,
                ReturnKind::Wad => follow(watch, &provider, Rendered::Wad).await,
                ReturnKind::Address => follow::<Address>(watch, &provider, Rendered::Address).await,
                ReturnKind::Bool => follow(watch, &provider, Rendered::Bool).await,
                ReturnKind::String => follow(watch, &provider, Rendered::Text).await,
                ReturnKind::Bytes32 => follow::<B256>(watch, &provider, Rendered::Word).await,
            }
        }
        Command::Redeem {
            project,
            amount,
            min_return,
            ticket,
            beneficiary,
        } => {
            redeem(
                &settings,
                &provider,
                ProjectId(project),
                &amount,
                min_return.as_deref(),
                ticket,
                beneficiary,
            )
            .await
        }
        Command::Convert { project } => {
            let request = convert_request(&settings.contracts()?, ProjectId(project))?;
            submit_and_report(&transactor(&settings, &provider), request).await;
            Ok(())
        }
        Command::Deploy { draft } => deploy(&settings, &provider, &draft).await,
    }
}

fn parse_all(raw: &[String]) -> Result<Vec<shared::protocol::CallArg>> {
    raw.iter().map(|arg| parse_call_arg(arg)).collect()
}

fn transactor(settings: &Settings, provider: &RpcProvider) -> Transactor {
    match settings.account {
        Some(account) => Transactor::new(Some(Arc::new(provider.signer(account)))),
        None => Transactor::disconnected(),
    }
}

async fn read_once(
    settings: &Settings,
    provider: &RpcProvider,
    contract: &str,
    operation: &str,
    args: &[String],
    returns: ReturnKind,
) -> Result<()> {
    let endpoint = resolve_endpoint(&settings.contracts()?, contract)?;
    let calldata = encode_call(operation, &parse_all(args)?)?;
    let raw = provider
        .call(endpoint.address, calldata)
        .await
        .with_context(|| format!("{endpoint}.{operation} failed"))?;
    println!("{}", returns.decode(&raw)?);
    Ok(())
}

struct WatchSpec {
    endpoint: Endpoint,
    operation: String,
    args: Vec<shared::protocol::CallArg>,
    triggers: Vec<RefreshTrigger>,
    poll: Option<Duration>,
}

async fn follow<T>(
    target: WatchSpec,
    provider: &Arc<RpcProvider>,
    render: impl Fn(T) -> Rendered,
) -> Result<()>
where
    T: AbiDecode + Clone + PartialEq + Send + Sync + 'static,
{
    let mut reader = StateReader::<T>::new(target.endpoint, target.operation)
        .args(Some(target.args))
        .update_on_all(target.triggers);
    if let Some(every) = target.poll {
        reader = reader.poll_every(every);
    }
    let mut value = reader.spawn(provider.clone(), provider.clone());
    if !value.is_active() {
        bail!("{} could not be started", value.label());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = value.changed() => match change {
                Some(Some(next)) => println!("{}", render(next)),
                Some(None) => {}
                None => break,
            },
        }
    }
    value.close();
    Ok(())
}

async fn redeem(
    settings: &Settings,
    provider: &Arc<RpcProvider>,
    project: ProjectId,
    amount: &str,
    min_return: Option<&str>,
    ticket: Option<Address>,
    beneficiary: Option<Address>,
) -> Result<()> {
    let contracts = settings.contracts()?;
    let amount = parse_wad(amount).context("invalid --amount")?;
    let beneficiary = beneficiary
        .or(settings.account)
        .context("no beneficiary: pass --beneficiary or set APP__ACCOUNT")?;

    let min_return = match min_return {
        Some(raw) => parse_wad(raw).context("invalid --min-return")?,
        None => {
            let watch = RewardsWatch::spawn(
                &contracts,
                ticket.map(|address| Endpoint::new("Ticket", address)),
                project,
                settings.account,
                provider.clone(),
                provider.clone(),
            )?;
            let expected = computed_min_return(&watch, amount, ticket.is_some()).await?;
            println!("minimum return: {}", format_wad(expected));
            expected
        }
    };

    let request = redeem_request(&contracts, project, amount, min_return, beneficiary)?;
    submit_and_report(&transactor(settings, provider), request).await;
    Ok(())
}

async fn computed_min_return(watch: &RewardsWatch, amount: U256, with_ticket: bool) -> Result<U256> {
    let ready = async {
        loop {
            let snapshot = watch.snapshot();
            let supply_known = !with_ticket || snapshot.ticket_supply.is_some();
            if supply_known {
                if let Some(expected) = snapshot.min_redeem_for(amount) {
                    return expected;
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    tokio::time::timeout(SNAPSHOT_TIMEOUT, ready)
        .await
        .context("overflow, bonding curve rate or supply unavailable; pass --min-return")
}

async fn deploy(settings: &Settings, provider: &RpcProvider, draft_path: &Path) -> Result<()> {
    let raw = fs::read_to_string(draft_path)
        .with_context(|| format!("failed to read '{}'", draft_path.display()))?;
    let draft: ProjectDraft = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse '{}'", draft_path.display()))?;

    let flags = risk_flags(&draft.properties, &draft.cycle_metadata);
    for warning in warning_text(&flags, &draft.cycle_metadata) {
        println!("warning: {warning}");
    }

    let deployer = ProjectDeployer::new(
        settings.contracts()?,
        transactor(settings, provider),
        Arc::new(PinningClient::new(
            settings.metadata_url.clone(),
            settings.metadata_token.clone(),
        )),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let submitted = deployer
        .deploy(&draft, move |event| {
            let _ = tx.send(event);
        })
        .await?;

    while let Some(event) = rx.recv().await {
        match event {
            DeployEvent::Pending if submitted => println!("deploy pending"),
            DeployEvent::Pending => println!("no signing account configured"),
            DeployEvent::Confirmed {
                project_id: Some(id),
            } => println!("deployed project {id}"),
            DeployEvent::Confirmed { project_id: None } => {
                println!("deployed; project id not found in receipt")
            }
            DeployEvent::Cancelled(reason) => println!("deploy cancelled: {reason}"),
        }
    }
    if !submitted {
        println!("deploy not submitted");
    }
    Ok(())
}

async fn submit_and_report(transactor: &Transactor, request: TransactionRequest) {
    let label = format!("{}.{}", request.endpoint.label, request.operation);
    let (observer, mut rx) = TxObserver::channel();
    let accepted = transactor.submit(request, observer).await;

    while let Some(event) = rx.recv().await {
        match event {
            TxLifecycle::Done if accepted => println!("{label}: submitted, awaiting confirmation"),
            TxLifecycle::Done => println!("{label}: no signing account configured"),
            TxLifecycle::Confirmed(receipt) => println!(
                "{label}: confirmed {} in block {:?}",
                receipt.transaction_hash, receipt.block_number
            ),
            TxLifecycle::Cancelled(reason) => println!("{label}: cancelled, {reason}"),
        }
    }
}

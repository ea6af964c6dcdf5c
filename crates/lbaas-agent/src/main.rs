//! lbaas-agentd - load-balancer reconciliation engine
//!
//! Dry-run front end: reconciles a service model against an in-memory
//! fleet, optionally walks the SNAT lifecycle of the tenant's subnets, and
//! prints what the devices end up holding.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lbaas_agent::{
    AgentConfig, Device, LbaasBuilder, MemoryDeviceClient, MemoryPortAllocator, ServiceModel, SnatManager,
    SubnetInfo,
};
use lbaas_common::{BatchResult, Phase};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lbaas-agentd", version, about = "Load-balancer reconciliation engine")]
struct Args {
    /// Agent configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service model to reconcile (JSON)
    #[arg(short, long)]
    service: PathBuf,

    /// Device hostname, repeat for a fleet
    #[arg(short, long = "device", default_value = "bigip1")]
    devices: Vec<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of reconciliation rounds
    #[arg(long, default_value_t = 1)]
    rounds: usize,

    /// Subnets needing SNAT addresses (JSON list); assured for the load
    /// balancer's tenant, or released when it is pending delete
    #[arg(long)]
    snat_subnets: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting lbaas-agentd ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("lbaas-agentd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };

    let service: ServiceModel = read_json(&args.service)?;

    let client = Arc::new(MemoryDeviceClient::new());
    let builder = LbaasBuilder::new(&config, client.clone());
    let devices: Vec<Device> = args.devices.iter().map(Device::new).collect();

    let mut rounds = Vec::with_capacity(args.rounds);
    for round in 1..=args.rounds {
        let batch = builder.assure(&service, &devices).await;
        rounds.push(round_report(round, &batch));
    }

    let snat = match &args.snat_subnets {
        Some(path) => {
            let subnets: Vec<SubnetInfo> = read_json(path)?;
            let manager = SnatManager::new(
                config.clone(),
                builder.managers().clone(),
                client.clone(),
                Arc::new(MemoryPortAllocator::new()),
            );
            run_snat(&manager, &service, &subnets, &devices).await?
        }
        None => Vec::new(),
    };

    let report = json!({
        "rounds": rounds,
        "snat": snat,
        "devices": client.snapshot().await,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn round_report(round: usize, batch: &BatchResult) -> Value {
    let phases: serde_json::Map<String, Value> = Phase::ALL
        .iter()
        .map(|phase| {
            let (items, failed) = batch
                .phase(*phase)
                .fold((0, 0), |(items, failed), o| (items + 1, failed + usize::from(!o.is_success())));
            (phase.to_string(), json!({ "items": items, "failures": failed }))
        })
        .collect();
    let failures: Vec<_> = batch
        .failures()
        .map(|o| {
            json!({
                "device": o.device,
                "phase": o.phase,
                "item": o.item,
                "error": o.error().map(ToString::to_string),
                "retryable": o.error().is_some_and(|e| e.is_retryable()),
            })
        })
        .collect();
    json!({
        "round": round,
        "items": batch.len(),
        "phases": phases,
        "mutations": batch.mutations().collect::<Vec<_>>(),
        "failures": failures,
    })
}

/// Assures the tenant's SNAT addresses on every device, or releases them
/// when the load balancer is pending delete.
async fn run_snat(
    manager: &SnatManager,
    service: &ServiceModel,
    subnets: &[SubnetInfo],
    devices: &[Device],
) -> anyhow::Result<Vec<Value>> {
    let loadbalancer = service
        .loadbalancer
        .as_ref()
        .context("SNAT needs a load balancer")?;
    let tenant_id = loadbalancer
        .tenant_id
        .as_deref()
        .context("SNAT needs a tenant id")?;
    let release = loadbalancer.provisioning_status.is_pending_delete();

    let mut report = Vec::with_capacity(subnets.len() * devices.len());
    for subnet in subnets {
        let addresses = if release {
            Vec::new()
        } else {
            manager.get_addresses(subnet, tenant_id).await?
        };
        for device in devices {
            let entry = if release {
                let released = manager.delete(device, subnet, tenant_id).await?;
                json!({
                    "device": device.hostname,
                    "subnet": subnet.subnet_id,
                    "deleted_names": released.deleted_names,
                    "in_use_subnets": released.in_use_subnets,
                    "mutations": released.mutations,
                })
            } else {
                let mutations = manager.assure(device, subnet, &addresses, tenant_id).await?;
                json!({
                    "device": device.hostname,
                    "subnet": subnet.subnet_id,
                    "addresses": addresses,
                    "mutations": mutations,
                })
            };
            report.push(entry);
        }
    }
    info!("SNAT walk covered {} subnets for tenant {}", subnets.len(), tenant_id);
    Ok(report)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

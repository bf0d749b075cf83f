//! Command line interface: plan, apply, destroy and show.

use crate::config::{ClientConfig, DEFAULT_INTERFACE_SLOTS, DEFAULT_STATE_FILE};
use crate::error::{Error, Result};
use crate::gateway::{clear_state, read_state, write_state, AppliedState, HttpGatewayClient};
use crate::models::DhcpServiceSpec;
use crate::output::{print_observed, print_plan, print_report};
use crate::processing::{plan_specs, GatewayConfigSync, SlotAllocator};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "edge-dhcp-sync")]
#[command(about = "Reconcile DHCP subnets and interface slots on an edge gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Show the operations apply would run. Makes no remote call.
    Plan(SyncArgs),
    /// Bring the gateway in line with the desired configuration.
    Apply(SyncArgs),
    /// Remove everything the last apply provisioned.
    Destroy(DestroyArgs),
    /// Print the gateway's connected interfaces and DHCP pools.
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Desired configuration (JSON).
    #[arg(long)]
    pub desired: PathBuf,
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,
    /// Interface slots on the gateway.
    #[arg(long, default_value_t = DEFAULT_INTERFACE_SLOTS)]
    pub slots: usize,
}

#[derive(Parser, Debug)]
pub struct DestroyArgs {
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,
    #[arg(long, default_value_t = DEFAULT_INTERFACE_SLOTS)]
    pub slots: usize,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Gateway (edge) identifier.
    #[arg(long)]
    pub gateway: String,
    #[arg(long, default_value_t = DEFAULT_INTERFACE_SLOTS)]
    pub slots: usize,
}

/// Parse a desired-configuration file, naming the JSON path on failure.
pub fn read_desired(path: &Path) -> Result<DhcpServiceSpec> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Error reading {}: {e}", path.display())))?;
    let mut deserializer = serde_json::Deserializer::from_str(&json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        Error::Config(format!(
            "Error parsing {}: path={} error={}",
            path.display(),
            e.path(),
            e
        ))
    })
}

/// The previously applied spec, or an empty one for `desired`'s gateway.
fn previous_for(state: &Path, desired: &DhcpServiceSpec) -> Result<DhcpServiceSpec> {
    Ok(read_state(state)?
        .map(|s| s.spec)
        .unwrap_or_else(|| desired.empty_for()))
}

fn connect(slots: usize) -> Result<GatewayConfigSync<HttpGatewayClient>> {
    let client = HttpGatewayClient::new(ClientConfig::from_env()?)?;
    Ok(GatewayConfigSync::new(client, SlotAllocator::new(slots)))
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Plan(args) => {
            let desired = read_desired(&args.desired)?;
            let previous = previous_for(&args.state, &desired)?;
            let plan = plan_specs(&previous, &desired)?;
            print_plan(&desired.gateway_id, &plan);
        }
        Command::Apply(args) => {
            let desired = read_desired(&args.desired)?;
            let previous = previous_for(&args.state, &desired)?;
            let mut sync = connect(args.slots)?;
            let report = sync.update(&previous, &desired)?;
            print_report(&desired.gateway_id, &report);
            write_state(&args.state, &AppliedState::now(desired))?;
        }
        Command::Destroy(args) => {
            let Some(state) = read_state(&args.state)? else {
                log::warn!("Nothing applied yet, nothing to destroy");
                return Ok(());
            };
            let mut sync = connect(args.slots)?;
            let report = sync.delete(&state.spec)?;
            print_report(&state.spec.gateway_id, &report);
            clear_state(&args.state)?;
        }
        Command::Show(args) => {
            let mut sync = connect(args.slots)?;
            let observed = sync.read(&args.gateway)?;
            print_observed(&observed);
        }
    }
    Ok(())
}

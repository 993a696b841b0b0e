use anyhow::Result;
use tally_common::utils::config::load_config;
use tally_node::NodeConfig;

use crate::cli::Cli;

/// File (when given), then `TALLY_*` environment, then command-line flags.
pub fn load_node_config(args: &Cli) -> Result<NodeConfig> {
    let mut config: NodeConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };
    config.apply_env();

    if let Some(addr) = &args.server_addr {
        config.server_addr = addr.clone();
    }
    if let Some(owner) = args.owner {
        config.owner = Some(owner);
    }
    if let Some(path) = &args.snapshot {
        config.snapshot_path = Some(path.clone());
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

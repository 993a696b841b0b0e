use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_common::Address;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about = "Faucet-funded token ledger node", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    pub server_addr: Option<String>,

    /// Initial owner, used only when no snapshot exists yet
    #[arg(long)]
    pub owner: Option<Address>,

    /// Snapshot file kept across restarts
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a configuration file with every default filled in
    DefaultConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "tally",
            "--owner",
            "0x00000000000000000000000000000000000000aa",
            "--snapshot",
            "/tmp/ledger.json",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.owner, Some(Address::from_low_u64(0xaa)));
        assert_eq!(cli.snapshot, Some(PathBuf::from("/tmp/ledger.json")));
        assert!(cli.debug);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_rejects_bad_owner() {
        assert!(Cli::try_parse_from(["tally", "--owner", "0x12"]).is_err());
    }

    #[test]
    fn test_default_config_subcommand() {
        let cli = Cli::try_parse_from(["tally", "default-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::DefaultConfig)));
    }
}

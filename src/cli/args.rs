use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
pub struct MainArgs {
    /// The path to the config file for the tracker
    #[clap(long, short, required_unless_present = "list-ports")]
    pub config: Option<PathBuf>,

    /// List the serial ports on this machine and exit
    #[clap(long)]
    pub list_ports: bool,
}

//! Configuration inspection command

use basketrec_core::{error::Result, ServiceConfig};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

/// Handle configuration command
pub fn handle(action: ConfigAction, db_path: &Path, config: &ServiceConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# database: {}", db_path.display());
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

use clap::Subcommand;

use super::print_json;
use crate::host::Host;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's statistics
    Today,
    /// All-time statistics
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;
    let stats = match action {
        StatsAction::Today => host.db.stats_today()?,
        StatsAction::All => host.db.stats_all()?,
    };
    print_json(&stats)
}

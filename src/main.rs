//! mysql-probe - run a MySQL query against a server under test.

mod cli;

use cli::Cli;
use mysql_probe::db::MySqlDriver;
use mysql_probe::gateway::ConfiguredServer;
use mysql_probe::output;
use mysql_probe::{logging, MysqlQuery, MysqlQueryContext, ProbeError, Result};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        let message = failure_message(&e);
        error!("{}", message);
        // Printed even when logging is filtered off
        eprintln!("{message}");
        std::process::exit(1);
    }
}

/// Line reported on stderr when the run fails.
fn failure_message(error: &ProbeError) -> String {
    format!("{}: {}", error.category(), error)
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let (name, config) = cli.resolve_server()?;
    info!("Server: {} ({}, {:?} gateway)", name, config.address, config.gateway);

    let context = MysqlQueryContext::new(
        Arc::new(ConfiguredServer::new(name, config)),
        MysqlQuery::new(cli.query.clone()),
        Arc::new(MySqlDriver::new()),
    );

    let result = context.results().await?;
    print!("{}", output::render(&result, cli.output));

    Ok(())
}

use std::process;

use careflow_common::prelude::*;
use careflow_core::{RestBroker, ShutdownSignal, SystemClock};
use careflow_worker::{Cli, Fleet};
use clap::Parser;

fn main() {
    // a missing .env is fine, the environment may already carry everything
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(&cli) {
        error!("careflow-worker failed: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> CareResult<()> {
    let config = cli.load_config()?;
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.raise())
            .map_err(|e| ErrorCode::ConfigurationException(format!("signal handler: {}", e)))?;
    }

    let broker = Arc::new(RestBroker::new(config.broker.clone())?);
    let workers = cli.selected_workers();
    info!(
        "Starting {:?} against {}",
        workers.iter().map(|x| x.as_ref()).collect::<Vec<_>>(),
        config.broker.base_url
    );

    let handles = match Fleet::start(&workers, &config, broker, SystemClock::shared(), &shutdown) {
        Ok(handles) => handles,
        Err(e) => {
            shutdown.raise();
            return Err(e);
        }
    };

    let mut failed = None;
    for handle in handles {
        let name = handle.name().to_string();
        if let Err(e) = handle.join() {
            error!("Worker {} ended abnormally: {}", name, e);
            failed = Some(e);
        }
    }
    match failed {
        Some(e) => Err(e),
        None => {
            info!("All workers stopped");
            Ok(())
        }
    }
}

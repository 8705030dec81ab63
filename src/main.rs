mod synthetic;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use loadfleet::args::{FleetArgs, Role};
use loadfleet::logger;
use loadfleet::remote::{self, ConsoleRenderer, GeneratorCatalog, PoolOptions};

use synthetic::SyntheticGenerator;

fn main() -> Result<(), Box<dyn Error>> {
    let args = FleetArgs::parse();
    logger::init_logging(args.verbose, args.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match args.role()? {
            Role::Master { listen } => {
                let options = PoolOptions {
                    ping_period: Duration::from_millis(args.ping_period_ms.max(1)),
                    advertise: args.advertise.clone(),
                    stay_alive: args.stay_alive,
                };
                remote::run_master(
                    &listen,
                    args.slaves.clone(),
                    args.test_spec(),
                    Arc::new(ConsoleRenderer),
                    Box::new(|mut registry| {
                        remote::print_final_report(&mut registry);
                    }),
                    options,
                )
                .await?;
            }
            Role::Slave { listen } => {
                let mut catalog = GeneratorCatalog::default();
                catalog.register("synthetic", Arc::new(SyntheticGenerator));
                remote::run_slave(&listen, catalog).await?;
            }
        }
        Ok(())
    })
}

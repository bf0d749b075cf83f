use clap::Parser;
use edge_dhcp_sync::cli::{run, Cli};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use std::error::Error;

/// Console logging at `info` when there is no log4rs.yml to load.
fn init_default_logging() -> Result<(), Box<dyn Error>> {
    let stdout = ConsoleAppender::builder().build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    if log4rs::init_file("log4rs.yml", Default::default()).is_err() {
        init_default_logging()?;
    }
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let cli = Cli::parse();
    run(cli)?;

    log::info!("#End main()");
    Ok(())
}

use clap::Parser as _;
use saveconnect_bridge::commands;
use tracing_subscriber::filter::{LevelFilter, targets::Targets};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(clap::Parser)]
#[clap(version, about)]
enum Commands {
    Registers(commands::registers::Args),
    Status(commands::status::Args),
    Fan(commands::fan::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter = match std::env::var("SAVECONNECT_BRIDGE_LOG") {
        Ok(description) => description.parse::<Targets>().unwrap_or_else(|e| {
            eprintln!("warning: ignoring SAVECONNECT_BRIDGE_LOG: {e}");
            Targets::new().with_default(LevelFilter::WARN)
        }),
        Err(_) => Targets::new().with_default(LevelFilter::WARN),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Registers(args) => end(commands::registers::run(args)),
        Commands::Status(args) => end(commands::status::run(args)),
        Commands::Fan(args) => end(commands::fan::run(args)),
    }
}

use clap::Parser;
use dbload::adapter::inbound::cli::command::{CheckCommand, Cli, ColorChoice, Commands};
use dbload::adapter::inbound::cli::output::{self, OutputConfig};
use dbload::adapter::inbound::cli::{check, ddl, run};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));
    output::set_color(match cli.color {
        ColorChoice::Auto => None,
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
    });

    let result = match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Ddl(args) => ddl::execute(args),
        Commands::Check(CheckCommand::Config(args)) => {
            check::config::execute_config(args.config.as_deref())
        }
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

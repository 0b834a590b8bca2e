use clap::Parser;
use mixpower::{Cli, Command, commands, init_logging};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref(), &cli.log_level)?;

    match cli.command {
        Command::Run(args) => commands::run(args),
        Command::Summarize(args) => commands::summarize_command(args),
    }
}

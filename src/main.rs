use bdd_recon::cli::commands::{cmd_convert, cmd_export, cmd_match_step, cmd_parse};
use bdd_recon::cli::config::{Cli, Commands, load_config};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    // Resolve Ollama settings: CLI > config > defaults
    let ollama_endpoint = cli
        .ollama_endpoint
        .as_deref()
        .or(config.ollama.endpoint.as_deref());
    let ollama_model = cli
        .ollama_model
        .as_deref()
        .or(config.ollama.model.as_deref());

    match cli.command {
        Commands::Convert {
            recording,
            scenario,
            project,
            generator,
            trace,
        } => {
            let clean = cmd_convert(
                &recording,
                &scenario,
                &project,
                generator.as_deref(),
                trace.as_deref(),
                &config,
                cli.verbose,
                ollama_endpoint,
                ollama_model,
            )?;
            if !clean {
                std::process::exit(2);
            }
        }
        Commands::Parse { recording, format } => {
            cmd_parse(&recording, &format)?;
        }
        Commands::Export {
            project,
            format,
            output,
        } => {
            cmd_export(&project, &format, output.as_deref(), &config, cli.verbose)?;
        }
        Commands::MatchStep {
            pattern,
            params,
            project,
        } => {
            cmd_match_step(&pattern, params, &project, &config)?;
        }
    }

    Ok(())
}

use clap::Parser;
use credvault::cli::commands;
use credvault::cli::{load_settings, open_service, Cli, Commands};
use credvault::errors::Result;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        credvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Completions need neither config nor keys.
    if let Commands::Completions { ref shell } = cli.command {
        return commands::completions::execute(shell);
    }

    let settings = load_settings(cli)?;
    credvault::logging::init(&settings.log_level);
    let service = open_service(cli, &settings)?;

    match cli.command {
        Commands::Generate { ref name, ref args } => {
            commands::generate::execute(&service, name, args)
        }
        Commands::Set {
            ref name,
            ref credential_type,
            ref value,
        } => commands::set::execute(&service, name, credential_type, value.as_deref()),
        Commands::Get {
            ref name,
            version_id,
        } => commands::get::execute(&service, name, version_id),
        Commands::Versions { ref name } => commands::versions::execute(&service, name),
        Commands::Regenerate {
            ref name,
            transitional,
        } => commands::regenerate::execute(&service, name, transitional),
        Commands::BulkRegenerate { ref signed_by } => {
            commands::bulk_regenerate::execute(&service, signed_by)
        }
        Commands::Transitional { ref action } => {
            commands::transitional::execute(&service, action)
        }
        Commands::KeyUsage { json } => commands::key_usage::execute(&service, json),
        Commands::RotateKeys => commands::rotate_keys::execute(&service),
        Commands::Completions { .. } => Ok(()),
    }
}

mod cli;
mod params;

use anyhow::Context;
use clap::Parser;

use dbshift_store::MySqlTransport;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let text = std::fs::read_to_string(&args.params)
        .with_context(|| format!("reading parameter file {}", args.params.display()))?;
    let params: params::Params = serde_json::from_str(&text)
        .with_context(|| format!("parsing parameter file {}", args.params.display()))?;

    let (set, probes) = params.build_replacements()?;
    tracing::info!(pairs = set.len(), probes = probes.len(), "replacement plan derived");

    if args.plan {
        let plan = serde_json::json!({
            "replacements": set.pairs(),
            "probes": probes,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let settings = params.settings();
    let mut transport = MySqlTransport::connect(&params.db)?;
    let mut report = dbshift_engine::run(&mut transport, &settings, &set, &probes)?;

    if let Some(rename) = &params.rename_prefix {
        dbshift_engine::rename_prefix(&mut transport, &rename.from, &rename.to, &mut report)?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

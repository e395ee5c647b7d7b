use anyhow::Context;
use partition_rag::cli::output::Output;
use partition_rag::cli::session::Session;
use partition_rag::cli::Cli;
use partition_rag::utils::logging;
use partition_rag::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present; the OpenAI key usually lives there
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    logging::init(&config.logging, cli.verbose);

    let scenario = config.scenario(cli.scenario).with_context(|| {
        let known: Vec<String> = config.scenarios.iter().map(|s| s.id.to_string()).collect();
        format!(
            "No scenario with id {} in {} (known: {})",
            cli.scenario,
            cli.config.display(),
            known.join(", ")
        )
    })?;

    tracing::info!(scenario = scenario.id, name = %scenario.name, "Starting");
    output.banner(&scenario.name);

    let session = Session::prepare(&config, scenario)
        .await
        .with_context(|| format!("Failed to prepare scenario '{}'", scenario.name))?;
    session.report_failures(&output);
    session.describe(&output);

    session.run(&output).await?;
    Ok(())
}

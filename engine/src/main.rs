// Troupe workflow engine
// Main entry point for the troupe binary

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use troupe_engine::cli::{Cli, Command};
use troupe_engine::config::WorkflowConfig;
use troupe_engine::engine::Engine;
use troupe_engine::llm::DefaultModelFactory;
use troupe_engine::runtime::NativeModuleLoader;
use troupe_engine::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, input } => {
            let engine = build_engine(&config, cli.log.as_deref())?;
            handle_run(engine, &input).await
        }
        Command::Test { config } => {
            let engine = build_engine(&config, cli.log.as_deref())?;
            handle_test(engine).await
        }
        Command::Check { config } => {
            telemetry::init(cli.log.as_deref().unwrap_or("info"));
            let config = WorkflowConfig::from_path(&config)?;
            config.validate()?;
            println!(
                "OK: {} members, {} squads, {} tests",
                config.member_list().len(),
                config.squads.len(),
                config.tests.len()
            );
            Ok(())
        }
    }
}

fn build_engine(path: &Path, log_override: Option<&str>) -> anyhow::Result<Engine> {
    let config = WorkflowConfig::from_path(path)?;
    let level = log_override.unwrap_or(&config.observability.log_level);
    telemetry::init(level);
    tracing::info!("Troupe v{}", env!("CARGO_PKG_VERSION"));

    let engine = Engine::new(
        config,
        Arc::new(DefaultModelFactory::default()),
        Arc::new(NativeModuleLoader::new()),
    )?;
    Ok(engine)
}

async fn handle_run(mut engine: Engine, input: &str) -> anyhow::Result<()> {
    let record = engine.run_once(input).await?;

    match record.final_result() {
        Some(result) => {
            for (member, output) in result.member_outputs() {
                println!("[{member}]\n{}\n", output.content);
            }
        }
        None => println!("Run ended before any node executed."),
    }
    Ok(())
}

async fn handle_test(mut engine: Engine) -> anyhow::Result<()> {
    let report = engine.run_tests().await?;

    for result in &report.results {
        let status = if result.passed() { "PASS" } else { "FAIL" };
        println!("{status}  {}", result.run.run_id);
        for assertion in &result.assertions {
            if !assertion.passed {
                let detail = assertion
                    .message
                    .clone()
                    .or_else(|| assertion.actual.as_ref().map(|a| format!("got: {a}")))
                    .unwrap_or_default();
                println!("      {} {} \"{}\" {detail}", assertion.target, assertion.kind, assertion.value);
            }
        }
    }
    println!(
        "\n{}/{} tests passed (report: {})",
        report.passed_count(),
        report.results.len(),
        engine.reports_dir().display()
    );

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

use anyhow::Context;
use clap::Parser;
use hospital_charges::domain::model::RunSummary;
use hospital_charges::domain::ports::ConfigProvider;
use hospital_charges::utils::{logger, validation::Validate};
use hospital_charges::{ChargeCollector, ChargeError, CliConfig, HospitalsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting hospital-charges");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    tracing::info!("📁 Loading hospitals from: {}", config.config_file());
    let hospitals = match HospitalsConfig::from_file(config.config_file()) {
        Ok(hospitals) => hospitals,
        Err(e) => exit_with(&e),
    };
    if let Err(e) = hospitals.validate() {
        exit_with(&e);
    }

    // 命令列參數優先於設定檔
    if config.nested_values.is_none() {
        config.nested_values = hospitals.nested_values;
    }

    if config.list {
        print_hospitals(&hospitals);
        return Ok(());
    }

    let collector = ChargeCollector::from_config(&config, hospitals.hospitals)
        .context("Failed to build the HTTP client")?;

    let result = match config.hospital.as_deref() {
        Some(short_name) => collector.download_specific(short_name).await,
        None => collector.download_all().await,
    };

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}

fn exit_with(e: &ChargeError) -> ! {
    tracing::error!("❌ {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

fn print_hospitals(config: &HospitalsConfig) {
    if config.is_empty() {
        println!("No hospitals configured");
        return;
    }

    for hospital in &config.hospitals {
        let status = if hospital.download_url().is_some() {
            "✓"
        } else {
            "⚠ no file_url"
        };
        println!("{:<24} {} ({})", hospital.short_name, hospital.name, status);
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "✓ Complete! Successfully downloaded {}/{} hospitals",
        summary.succeeded, summary.total
    );
    if summary.converted > 0 {
        println!("  {} JSON file(s) converted to CSV", summary.converted);
    }
    if summary.conversion_failures > 0 {
        println!(
            "  ⚠ {} JSON file(s) could not be converted and were kept as-is",
            summary.conversion_failures
        );
    }
    println!("📁 Data saved to: {}", summary.data_dir.display());
}

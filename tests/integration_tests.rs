use anyhow::Result;
use httpmock::prelude::*;
use hospital_charges::domain::model::DownloadOutcome;
use hospital_charges::utils::validation::Validate;
use hospital_charges::{
    ChargeCollector, ChargeError, HospitalsConfig, HttpFetcher, JsonNormalizer, LocalStorage,
    NestedValues,
};
use tempfile::TempDir;

const RUN_DATE: &str = "2025-06-30";

fn write_config(dir: &TempDir, server: &MockServer) -> Result<std::path::PathBuf> {
    let config = serde_json::json!({
        "hospitals": [
            {
                "name": "Yale New Haven Hospital",
                "short_name": "Yale-New-Haven",
                "file_url": server.url("/ynhh/standard_charges.json"),
                "billing_page": "https://example.org/ynhh/billing",
                "last_verified": "2025-06-01"
            },
            {
                "name": "Bridgeport Hospital",
                "short_name": "bridgeport",
                "file_url": server.url("/MRF/Download.ashx")
            },
            {
                "name": "Greenwich Hospital",
                "short_name": "greenwich",
                "billing_page": "https://example.org/greenwich/billing"
            },
            {
                "name": "Lawrence + Memorial",
                "short_name": "lmh",
                "file_url": server.url("/lmh/charges.json")
            }
        ]
    });

    let path = dir.path().join("hospitals_config.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
    Ok(path)
}

#[tokio::test]
async fn test_end_to_end_download_all() -> Result<()> {
    let config_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    let server = MockServer::start();

    let json_mock = server.mock(|when, then| {
        when.method(GET).path("/ynhh/standard_charges.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "hospital_name": "Yale New Haven Hospital",
                "data": [
                    {"code": "99213", "description": "Office visit", "gross_charge": 210.0},
                    {"code": "70551", "description": "MRI brain", "discounted_cash": 900}
                ]
            }));
    });
    let ashx_mock = server.mock(|when, then| {
        when.method(GET).path("/MRF/Download.ashx");
        then.status(200).body("code,price\n99213,210\n");
    });
    let failing_mock = server.mock(|when, then| {
        when.method(GET).path("/lmh/charges.json");
        then.status(503);
    });

    let config_path = write_config(&config_dir, &server)?;
    let hospitals = HospitalsConfig::from_file(&config_path)?;
    hospitals.validate()?;

    let collector = ChargeCollector::new(
        HttpFetcher::with_timeout_secs(5)?,
        LocalStorage::new(data_dir.path()),
        hospitals.hospitals,
    )
    .with_run_date(RUN_DATE);

    let summary = collector.download_all().await?;

    json_mock.assert();
    ashx_mock.assert();
    failing_mock.assert();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.conversion_failures, 0);

    let ynhh_dir = data_dir.path().join("yale-new-haven").join(RUN_DATE);
    assert!(!ynhh_dir.join("standard_charges.json").exists());
    let csv_content = std::fs::read_to_string(ynhh_dir.join("standard_charges.csv"))?;
    let lines: Vec<&str> = csv_content.lines().collect();
    assert_eq!(lines[0], "code,description,discounted_cash,gross_charge");
    assert_eq!(lines[1], "99213,Office visit,,210.0");
    assert_eq!(lines[2], "70551,MRI brain,900,");

    let bridgeport_dir = data_dir.path().join("bridgeport").join(RUN_DATE);
    assert!(!bridgeport_dir.join("Download.ashx").exists());
    assert_eq!(
        std::fs::read_to_string(bridgeport_dir.join("Download.csv"))?,
        "code,price\n99213,210\n"
    );

    assert!(!data_dir.path().join("greenwich").exists());
    Ok(())
}

#[tokio::test]
async fn test_unusable_file_urls_do_not_stop_the_run() -> Result<()> {
    let config_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    let server = MockServer::start();

    let good_mock = server.mock(|when, then| {
        when.method(GET).path("/good/charges.json");
        then.status(200)
            .json_body(serde_json::json!({"charges": [{"code": "A1", "price": 10}]}));
    });

    let config_path = config_dir.path().join("hospitals_config.json");
    std::fs::write(
        &config_path,
        serde_json::to_vec(&serde_json::json!({
            "hospitals": [
                {"name": "Empty", "short_name": "empty", "file_url": ""},
                {"name": "Placeholder", "short_name": "placeholder", "file_url": "${HOSPITAL_CHARGES_UNSET_URL}"},
                {"name": "Good", "short_name": "good", "file_url": server.url("/good/charges.json")}
            ]
        }))?,
    )?;

    let hospitals = HospitalsConfig::from_file(&config_path)?;
    hospitals.validate()?;

    let collector = ChargeCollector::new(
        HttpFetcher::with_timeout_secs(5)?,
        LocalStorage::new(data_dir.path()),
        hospitals.hospitals,
    )
    .with_run_date(RUN_DATE);

    let summary = collector.download_all().await?;

    good_mock.assert();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.converted, 1);
    assert_eq!(
        std::fs::read_to_string(data_dir.path().join("good").join(RUN_DATE).join("charges.csv"))?,
        "code,price\nA1,10\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_url_without_filename_uses_dated_json_name() -> Result<()> {
    let data_dir = TempDir::new()?;
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/api/v1/prices");
        then.status(200).json_body(serde_json::json!([
            {"code": "A1", "payer": {"name": "Aetna"}}
        ]));
    });

    let url = server.url("/api/v1/prices");
    let collector = ChargeCollector::new(
        HttpFetcher::with_timeout_secs(5)?,
        LocalStorage::new(data_dir.path()),
        Vec::new(),
    )
    .with_normalizer(JsonNormalizer::new(NestedValues::Flatten))
    .with_run_date(RUN_DATE);

    let outcome = collector
        .download_file(&url, &format!("api/{}/charges_{}.json", RUN_DATE, RUN_DATE))
        .await?;

    let expected = data_dir
        .path()
        .join("api")
        .join(RUN_DATE)
        .join(format!("charges_{}.csv", RUN_DATE));
    assert_eq!(
        outcome,
        DownloadOutcome::Converted {
            csv_path: expected.clone(),
            rows: 1
        }
    );
    assert_eq!(
        std::fs::read_to_string(expected)?,
        "code,payer.name\nA1,Aetna\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_download_specific_unknown_hospital_lists_available() -> Result<()> {
    let config_dir = TempDir::new()?;
    let data_dir = TempDir::new()?;
    let server = MockServer::start();

    let config_path = write_config(&config_dir, &server)?;
    let hospitals = HospitalsConfig::from_file(&config_path)?;

    let collector = ChargeCollector::new(
        HttpFetcher::with_timeout_secs(5)?,
        LocalStorage::new(data_dir.path()),
        hospitals.hospitals,
    );

    let err = collector.download_specific("st-vincents").await.unwrap_err();

    assert!(matches!(err, ChargeError::HospitalNotFound { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(err
        .user_friendly_message()
        .contains("Yale-New-Haven, bridgeport, greenwich, lmh"));
    Ok(())
}

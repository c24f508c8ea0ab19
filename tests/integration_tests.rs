use chrono::NaiveDate;
use kpi_digest::*;
use std::collections::BTreeMap;

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 14).unwrap()
}

fn daily_labels(days: u32) -> Vec<String> {
    (1..=days).map(|d| format!("2025-11-{:02}", d)).collect()
}

fn zzem_daily() -> RawTable {
    let labels = daily_labels(14);
    let mut header = vec!["metric".to_string(), "name".to_string()];
    header.extend(labels);

    let row = |key: &str, name: &str, values: &[&str]| {
        let mut row = vec![key.to_string(), name.to_string()];
        row.extend(values.iter().map(|v| v.to_string()));
        row
    };

    RawTable::from(vec![
        vec!["[Daily] ZZEM".to_string()],
        vec![],
        header,
        row(
            "Paid_Cohort_Retention",
            "Paid Cohort Retention",
            &["70%", "71%", "72%", "73%", "74%", "75%", "76%", "77%", "78%", "79%", "80%", "79%", "78%", "77%"],
        ),
        row(
            "CVR",
            "CVR",
            &["14%", "14%", "14%", "14%", "14%", "14%", "14%", "14%", "14%", "14%", "14%", "14%", "20%", "15%"],
        ),
        vec![String::new(), String::new(), "123".to_string()],
        row(
            "ARPPU",
            "ARPPU",
            &["₩27,000", "₩27,100", "#N/A", "₩27,200", "₩27,300", "₩27,400", "₩27,500", "₩27,600", "₩27,700", "₩27,800", "₩27,900", "₩28,000", "₩27,000", "₩26,000"],
        ),
        row("Margin_Rate", "마진율", &["30%", "", "0", "31%"]),
        row(
            "Installs",
            "Installs",
            &["1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,000", "1,300", "1,000", "700"],
        ),
    ])
}

fn zzem_monthly() -> RawTable {
    RawTable::from(vec![
        vec!["metric", "name", "목표 KPI", "Crack", "2025-09", "2025-10", "2025-11"],
        vec!["Paid_Cohort_Retention", "Paid Cohort Retention", "80%", "70%", "72%", "76%", "75%"],
        vec!["CVR", "CVR", "15%", "12%", "13%", "12.5%", "-"],
        vec!["ARPPU", "ARPPU", "₩30,000", "₩25,000", "₩26,000", "₩29,400", ""],
    ])
}

fn kpi_review() -> RawTable {
    RawTable::from(vec![
        vec!["KPI Review"],
        vec!["weekly", "monthly", "name"],
        vec![
            "Paid_Cohort_Retention_W", "Paid_Cohort_Retention", "Paid Cohort Retention",
            "74%", "76%", "2.7%", "72%", "76%", "5.56%",
            "60%", "61%", "1.67%", "58%", "61%", "5.17%",
        ],
        vec!["", "", ""],
        vec![
            "CVR", "CVR_M", "CVR",
            "14%", "15%", "7.14%", "13%", "12.5%", "-3.85%",
        ],
        vec![
            "ARPPU", "ARPPU", "ARPPU",
            "₩27,000", "₩27,500", "1.85%", "₩26,000", "₩29,400", "13.08%",
        ],
    ])
}

fn source() -> BTreeMap<String, RawTable> {
    let mut tables = BTreeMap::new();
    tables.insert("[Daily] ZZEM".to_string(), zzem_daily());
    tables.insert("[Monthly] ZZEM".to_string(), zzem_monthly());
    tables.insert("KPI Review".to_string(), kpi_review());
    tables.insert("[Daily] 사주".to_string(), RawTable::default());
    tables
}

fn comparison<'a>(comparisons: &'a [PeriodComparison], key: &str) -> &'a PeriodComparison {
    comparisons
        .iter()
        .find(|c| c.metric_key == key)
        .unwrap_or_else(|| panic!("no comparison for {}", key))
}

#[test]
fn test_full_service_analysis() -> anyhow::Result<()> {
    let config = KpiConfig::reference();
    config.validate()?;

    let analysis = KpiAnalyzer::new(&config).analyze_service("ZZEM", &source(), run_date())?;

    let daily = analysis.daily_data.as_ref().expect("daily data");
    assert_eq!(daily.metrics.len(), 5);
    assert_eq!(daily.metrics[0].period_labels.len(), 14);
    let margin = daily.find("Margin_Rate").unwrap();
    assert_eq!(margin.values.len(), 14);
    assert_eq!(margin.values[1], None);

    let targets = &analysis.target_comparisons;
    assert_eq!(targets.len(), 4);
    assert_eq!(targets[0].current_value, Some(0.75));
    assert_eq!(targets[0].status, Status::OnTrack);
    assert_eq!(targets[1].current_value, Some(0.125));
    assert_eq!(targets[1].status, Status::AtRisk);
    assert_eq!(targets[2].current_value, Some(29400.0));
    assert!((targets[2].achievement_rate.unwrap() - 105.0).abs() < 1e-9);
    assert_eq!(targets[3].current_value, None);
    assert_eq!(targets[3].status, Status::Critical);
    assert_eq!(targets[3].display_name, "마진율");

    let mom = comparison(&analysis.mom_comparisons, "CVR");
    assert_eq!(mom.display_name, "CVR");
    assert_eq!(mom.previous_value, Some(0.13));
    assert!((mom.percent_change.unwrap() + 0.0385).abs() < 1e-9);

    let wow = comparison(&analysis.wow_comparisons, "Paid_Cohort_Retention");
    assert_eq!(wow.previous_value, Some(0.74));
    assert!((wow.percent_change.unwrap() - 0.027).abs() < 1e-9);

    let missing = comparison(&analysis.wow_comparisons, "Margin_Rate");
    assert_eq!(missing.display_name, "Margin_Rate");
    assert_eq!(missing.previous_value, None);

    let dod_margin = comparison(&analysis.dod_comparisons, "Margin_Rate");
    assert_eq!(dod_margin.previous_value, Some(0.0));
    assert_eq!(dod_margin.current_value, Some(0.31));
    assert_eq!(dod_margin.percent_change, None);

    Ok(())
}

#[test]
fn test_alerts_over_daily_table() -> anyhow::Result<()> {
    let config = KpiConfig::reference();
    let analysis = KpiAnalyzer::new(&config).analyze_service("ZZEM", &source(), run_date())?;

    // CVR 14% -> 20% -> 15%, installs 1,000 -> 1,300 -> 1,000 -> 700.
    let anomalies = &analysis.anomalies;
    assert_eq!(anomalies.len(), 5);
    assert_eq!(anomalies[0].period_label, "2025-11-14");
    assert_eq!(anomalies[0].metric_key, "Installs");
    assert_eq!(anomalies[0].kind, AnomalyKind::Drop);
    assert_eq!(anomalies[1].period_label, "2025-11-14");
    assert_eq!(anomalies[1].metric_key, "CVR");
    assert_eq!(anomalies[2].period_label, "2025-11-13");
    assert_eq!(anomalies[2].metric_key, "CVR");
    assert_eq!(anomalies[2].kind, AnomalyKind::Spike);

    let trend_keys: Vec<&str> = analysis.trends.iter().map(|t| t.metric_key.as_str()).collect();
    assert_eq!(trend_keys, vec!["Paid_Cohort_Retention"]);
    let retention = &analysis.trends[0];
    assert_eq!(retention.consecutive_decline_days, 3);
    assert_eq!(retention.start_label, "2025-11-11");
    assert_eq!(retention.end_label, "2025-11-14");
    assert!((retention.total_decline_percent + 3.75).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_analyze_all_keeps_service_order() {
    let config = KpiConfig::reference();
    let analyses = KpiAnalyzer::new(&config).analyze_all(&source(), run_date());

    assert_eq!(analyses.len(), 2);
    assert_eq!(analyses[0].service, "ZZEM");
    assert_eq!(analyses[1].service, "사주");

    let saju = &analyses[1];
    assert!(saju.daily_data.is_none());
    assert!(saju.dod_comparisons.is_empty());
    assert!(saju.anomalies.is_empty());

    // 사주 reads columns J..O of the review table.
    let review = saju.review_data.as_ref().unwrap();
    let retention = review.find("Paid_Cohort_Retention_W").unwrap();
    assert_eq!(retention.prev_week, Some(0.6));
    let cvr = review.find("CVR_M").unwrap();
    assert_eq!(cvr.prev_week, None);
}

#[test]
fn test_analysis_serializes_to_json() -> anyhow::Result<()> {
    let config = KpiConfig::reference();
    let analysis = KpiAnalyzer::new(&config).analyze_service("ZZEM", &source(), run_date())?;

    let json = serde_json::to_value(&analysis)?;
    assert_eq!(json["date"], "2025-11-14");
    assert_eq!(json["target_comparisons"][0]["status"], "on_track");
    assert_eq!(json["anomalies"][0]["kind"], "drop");
    assert!(json["narrative"].is_null());
    assert!(json["monthly_data"]["metrics"][0]["target"].is_number());

    Ok(())
}

#[test]
fn test_csv_export_pipeline() -> anyhow::Result<()> {
    let csv = "\
,ZZEM Weekly,,
metric,name,W1,W2,W3
Paid_Cohort_Retention,Paid Cohort Retention,71%,72%,73%
,,,,
CVR,CVR,\"1,267\",#DIV/0!
";
    let table = read_csv_table(csv.as_bytes())?;
    let config = KpiConfig::reference();
    let layout = config.layout_for("ZZEM", Cadence::Weekly).unwrap();

    let weekly = extract_series(&table, layout);
    assert_eq!(weekly.metrics.len(), 2);
    assert_eq!(weekly.metrics[0].period_labels.as_ref(), &["W1", "W2", "W3"]);
    assert_eq!(weekly.metrics[1].values, vec![Some(1267.0), None, None]);

    Ok(())
}

#[test]
fn test_config_from_json_file() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("kpi-digest-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("config.json");

    let mut config = KpiConfig::reference();
    config.thresholds.anomaly_threshold = 0.5;
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

    let loaded = KpiConfig::from_json_file(&path)?;
    assert_eq!(loaded.thresholds.anomaly_threshold, 0.5);

    let analysis = KpiAnalyzer::new(&loaded).analyze_service("ZZEM", &source(), run_date())?;
    // CVR 14% -> 20% (+42.9%) and the install swings stay under 50%.
    assert_eq!(analysis.anomalies.len(), 1);
    assert_eq!(analysis.anomalies[0].metric_key, "Margin_Rate");
    assert_eq!(analysis.anomalies[0].period_label, "2025-11-03");

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_invalid_config_fails_fast() {
    let mut config = KpiConfig::reference();
    config.layouts[0].metric_key_column = 7;
    let json = serde_json::to_string(&config).unwrap();

    match KpiConfig::from_json_str(&json) {
        Err(KpiDigestError::InvalidLayout { table, .. }) => assert_eq!(table, "[Daily] ZZEM"),
        other => panic!("expected layout error, got {:?}", other),
    }
}

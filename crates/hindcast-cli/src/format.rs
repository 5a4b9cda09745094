//! Text and JSON rendering of command results.

use chrono::NaiveDate;
use hindcast_history::{AnomalyResult, ChartPoint, HistoryError, LookupReport, SyncReport};
use serde_json::{json, Value};

pub fn anomaly_json(anomaly: &Result<AnomalyResult, HistoryError>) -> Value {
    match anomaly {
        Ok(result) => json!(result),
        Err(e) => json!({
            "error": e.to_string(),
            "message": e.user_message(),
        }),
    }
}

pub fn lookup_json(report: &LookupReport) -> Value {
    json!({
        "location": report.location,
        "coordinates": report.coordinates,
        "current": report.current,
        "sync": report.sync,
        "series": report.series,
        "anomaly": anomaly_json(&report.anomaly),
    })
}

pub fn lookup_text(report: &LookupReport) -> String {
    let current = &report.current;
    let mut out = format!(
        "{} ({})\n  Now: {:.1}°C ({})  Today: {:.1}°C to {:.1}°C\n",
        report.location,
        report.coordinates,
        current.temperature,
        if current.is_day { "day" } else { "night" },
        current.day_min,
        current.day_max,
    );
    out.push_str(&format!("  {}\n", sync_text(&report.sync)));
    out.push_str(&format!("  {}\n", anomaly_text(&report.anomaly)));
    if let (Some(first), Some(last)) = (report.series.first(), report.series.last()) {
        out.push_str(&format!(
            "  Series: {} days, {} to {}\n",
            report.series.len(),
            first.date,
            last.date
        ));
    }
    out
}

pub fn sync_text(report: &SyncReport) -> String {
    format!(
        "Synced {} of {} days for {} ({} to {})",
        report.applied, report.fetched, report.location, report.start_date, report.end_date
    )
}

pub fn anomaly_text(anomaly: &Result<AnomalyResult, HistoryError>) -> String {
    match anomaly {
        Ok(a) => {
            let mut line = format!(
                "Anomaly: {:+.1}% vs {:.1}°C average of {} years",
                a.percent_deviation, a.average_of_years, a.years_found
            );
            if !a.missing_years.is_empty() {
                let missing: Vec<String> = a.missing_years.iter().map(i32::to_string).collect();
                line.push_str(&format!(" (no data for {})", missing.join(", ")));
            }
            line
        }
        Err(e) => format!("Anomaly unavailable: {}", e.user_message()),
    }
}

pub fn series_text(points: &[ChartPoint]) -> String {
    if points.is_empty() {
        return "No stored history.\n".to_string();
    }
    points
        .iter()
        .map(|p| format!("{:>6}  {}  {:>6.1}\n", p.index, p.date, p.mean_temp))
        .collect()
}

pub fn locations_text(rows: &[(String, usize, Option<(NaiveDate, NaiveDate)>)]) -> String {
    if rows.is_empty() {
        return "No stored locations.\n".to_string();
    }
    rows.iter()
        .map(|(location, days, span)| match span {
            Some((first, last)) => format!("{}  {} days  {} to {}\n", location, days, first, last),
            None => format!("{}  {} days\n", location, days),
        })
        .collect()
}

pub fn locations_json(rows: &[(String, usize, Option<(NaiveDate, NaiveDate)>)]) -> Value {
    Value::Array(
        rows.iter()
            .map(|(location, days, span)| {
                json!({
                    "location": location,
                    "days": days,
                    "first": span.map(|(first, _)| first),
                    "last": span.map(|(_, last)| last),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn anomaly() -> AnomalyResult {
        AnomalyResult {
            average_of_years: 20.0,
            current_reading: 22.0,
            percent_deviation: 10.0,
            years_found: 8,
            years_requested: 10,
            missing_years: vec![2017, 2020],
        }
    }

    #[test]
    fn test_anomaly_text_lists_missing_years() {
        assert_eq!(
            anomaly_text(&Ok(anomaly())),
            "Anomaly: +10.0% vs 20.0°C average of 8 years (no data for 2017, 2020)"
        );
    }

    #[test]
    fn test_anomaly_error_is_reported_not_hidden() {
        let value = anomaly_json(&Err(HistoryError::InsufficientHistory { found: 0, required: 1 }));
        assert_eq!(value["error"], "Insufficient history: found 0 of 1 required years");
        assert!(value["message"].as_str().unwrap().contains("Not enough"));
    }

    #[test]
    fn test_anomaly_json_fields() {
        let value = anomaly_json(&Ok(anomaly()));
        assert_eq!(value["percent_deviation"], 10.0);
        assert_eq!(value["missing_years"], json!([2017, 2020]));
    }

    #[test]
    fn test_empty_series_text() {
        assert_eq!(series_text(&[]), "No stored history.\n");
    }

    #[test]
    fn test_locations_json_span() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let rows = vec![("Oslo".to_string(), 2, Some((d("2020-01-01"), d("2020-01-02"))))];
        let value = locations_json(&rows);
        assert_eq!(value[0]["first"], "2020-01-01");
        assert_eq!(value[0]["days"], 2);
    }
}

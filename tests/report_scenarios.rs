use pretty_assertions::assert_eq;
use request_report::util::round2;
use request_report::{build_report, build_report_from_value, build_report_with_diagnostics, ReportModel};
use serde_json::{json, Value};

fn dashboard_input() -> (Vec<Value>, Vec<Value>) {
    let dates = vec![
        json!({"month": "2024-01", "requests": 10, "closed": 4}),
        json!({"month": "2024-01", "requests": 5, "closed": 1}),
        json!({"month": "2023-12", "requests": 3, "closed": 3}),
    ];
    let depts = vec![
        json!({"department": "IT", "request_status": "종료", "request_date": "2024-01-03", "count": 4}),
        json!({"department": "IT", "request_status": "요청", "request_date": "2024-01-04", "count": "2"}),
        json!({"department": "HR", "request_status": "요청", "request_date": "2024-01-10", "count": 1}),
        json!({"department": "2024-01", "request_status": "요청", "request_date": "2024-01-10", "count": 99}),
        json!({"department": "Sales", "request_status": "Escalated", "request_date": "2024-01-22", "count": 3}),
        json!({"department": "Legal", "request_status": "반려", "request_date": "2023-12-12", "count": 40}),
    ];
    (dates, depts)
}

#[test]
fn duplicate_months_merge_into_the_expected_series() {
    let (dates, _) = dashboard_input();
    let model = build_report(&dates, &[]);
    let points: Vec<(String, u64, u64, f64)> = model
        .monthly_series
        .points
        .iter()
        .map(|p| (p.month.clone(), p.requests, p.closed, round2(p.closure_rate)))
        .collect();
    assert_eq!(
        points,
        vec![
            ("2023-12".to_string(), 3, 3, 100.0),
            ("2024-01".to_string(), 15, 5, 33.33),
        ]
    );
    assert_eq!(model.latest_month.as_deref(), Some("2024-01"));
}

#[test]
fn date_shaped_department_never_reaches_the_cross_tab() {
    let (dates, depts) = dashboard_input();
    let (model, diagnostics) = build_report_with_diagnostics(&dates, &depts);
    let tab = &model.cross_tab;
    assert_eq!(tab.departments, vec!["IT", "Sales", "HR"]);
    assert!(!tab.departments.iter().any(|d| d.starts_with("2024")));
    assert_eq!(tab.statuses, vec!["종료", "요청", "Escalated"]);
    assert_eq!(tab.cell("IT", "요청"), 2);
    assert_eq!(tab.cell("Legal", "반려"), 0);
    assert_eq!(diagnostics.rows_field_swapped, 1);
    assert_eq!(diagnostics.rows_outside_period, 1);
}

#[test]
fn empty_input_builds_the_empty_report() {
    let model = build_report(&[], &[]);
    assert_eq!(model, ReportModel::empty());
    assert!(model.latest_month.is_none());

    let (model, diagnostics) = build_report_from_value(json!({"date_stats": [], "department_stats": []}));
    assert!(model.is_empty());
    assert!(diagnostics.missing_anchor);
}

#[test]
fn department_rows_without_dates_give_an_empty_cross_tab() {
    let (_, depts) = dashboard_input();
    let model = build_report(&[], &depts);
    assert!(model.cross_tab.is_empty());
    assert!(model.monthly_series.is_empty());
}

#[test]
fn identical_input_serializes_identically() {
    let (dates, depts) = dashboard_input();
    let first = serde_json::to_vec(&build_report(&dates, &depts)).unwrap();
    let second = serde_json::to_vec(&build_report(&dates, &depts)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unknown_status_colour_is_stable_across_builds() {
    let (dates, depts) = dashboard_input();
    let a = build_report(&dates, &depts).cross_tab.color_of("Escalated");
    let b = build_report(&dates, &depts).cross_tab.color_of("Escalated");
    assert!(a.is_some());
    assert_eq!(a, b);
}

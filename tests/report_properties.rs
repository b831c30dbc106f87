use proptest::prelude::*;
use request_report::loader::{normalize_date_records, normalize_department_records};
use request_report::reports::{aggregate_cross_tab, aggregate_monthly, TOP_DEPARTMENTS};
use request_report::util::is_date_shaped;
use request_report::{DateRecord, DepartmentRecord};
use serde_json::{json, Value};

fn month() -> impl Strategy<Value = String> {
    (2022u32..2025, 1u32..13).prop_map(|(y, m)| format!("{y}-{m:02}"))
}

fn date_record() -> impl Strategy<Value = DateRecord> {
    (month(), 0u64..500, 0u64..500).prop_map(|(month, requests, closed)| DateRecord {
        month,
        requests,
        closed,
    })
}

fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z]{1,6}",
        Just("2024-01".to_string()),
        Just("2024-01-15".to_string()),
        Just("요청".to_string()),
        Just("종료".to_string()),
    ]
}

fn department_record() -> impl Strategy<Value = DepartmentRecord> {
    (label(), label(), 0u64..50, prop_oneof![Just("2024-01-05"), Just("2023-12-31")]).prop_map(
        |(department, status, count, date)| DepartmentRecord {
            department,
            status,
            record_date: date.to_string(),
            count,
        },
    )
}

fn raw_row() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!(null)),
        Just(json!("text")),
        Just(json!({})),
        ("[ a-z0-9-]{0,8}", "[ a-z0-9,]{0,5}").prop_map(|(m, r)| json!({"month": m, "requests": r})),
        ("[ A-Za-z]{0,5}", "[ A-Za-z]{0,5}")
            .prop_map(|(d, s)| json!({"department": d, "status": s, "date": "2024-01-01"})),
    ]
}

proptest! {
    #[test]
    fn normalizer_never_grows_and_keeps_identifiers(rows in prop::collection::vec(raw_row(), 0..40)) {
        let (dates, date_report) = normalize_date_records(&rows);
        prop_assert!(dates.len() <= rows.len());
        prop_assert_eq!(date_report.kept_rows + date_report.skipped_rows, rows.len());
        prop_assert!(dates.iter().all(|d| !d.month.is_empty()));

        let (depts, _) = normalize_department_records(&rows);
        prop_assert!(depts.len() <= rows.len());
        prop_assert!(depts.iter().all(|d| !d.department.is_empty() && !d.status.is_empty()));
    }

    #[test]
    fn series_totals_ignore_input_order(
        records in prop::collection::vec(date_record(), 0..30),
        seed in any::<u64>(),
    ) {
        let mut shuffled = records.clone();
        // Deterministic permutation driven by the seed.
        let n = shuffled.len();
        for i in (1..n).rev() {
            let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        let a = aggregate_monthly(&records);
        let b = aggregate_monthly(&shuffled);
        prop_assert_eq!(&a, &b);

        // With at most twelve distinct months nothing is windowed out.
        let distinct: std::collections::HashSet<&str> = records.iter().map(|r| r.month.as_str()).collect();
        if distinct.len() <= 12 {
            prop_assert_eq!(a.total_closed(), records.iter().map(|r| r.closed).sum::<u64>());
        }
        prop_assert!(a.len() <= 12);
        prop_assert!(a.points.windows(2).all(|w| w[0].month < w[1].month));
    }

    #[test]
    fn closure_rate_stays_in_bounds(records in prop::collection::vec(date_record(), 0..30)) {
        for p in aggregate_monthly(&records).points {
            prop_assert!((0.0..=100.0).contains(&p.closure_rate));
            if p.requests == 0 {
                prop_assert_eq!(p.closure_rate, 0.0);
            }
        }
    }

    #[test]
    fn cross_tab_invariants_hold(records in prop::collection::vec(department_record(), 0..60)) {
        let tab = aggregate_cross_tab(&records, Some("2024-01"));
        prop_assert!(tab.departments.len() <= TOP_DEPARTMENTS);
        let totals = tab.department_totals();
        prop_assert!(totals.windows(2).all(|w| w[0] >= w[1]));
        prop_assert!(tab.departments.iter().all(|d| !is_date_shaped(d)));
        prop_assert!(tab.statuses.iter().all(|s| !is_date_shaped(s)));
        prop_assert_eq!(tab.colors.len(), tab.statuses.len());
        prop_assert_eq!(tab, aggregate_cross_tab(&records, Some("2024-01")));
    }
}

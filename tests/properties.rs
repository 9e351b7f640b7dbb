use bias_audit::{
    ClassificationMetric, Dataset, DatasetMetric, GroupDefinition, GroupRole, Label, Record,
    Reweighing, Selector, Value,
};
use proptest::collection::vec;
use proptest::prelude::*;

/// (privileged?, true label, predicted label, starting weight)
type Row = (bool, bool, bool, f64);

fn build(rows: &[Row], favorable: Label) -> Dataset {
    let groups = GroupDefinition::from_roles([Value::Integer(1)], [Value::Integer(0)]).unwrap();
    let records = rows
        .iter()
        .map(|&(privileged, label, pred, w)| {
            Record::new(i64::from(privileged), Label::from(label))
                .with_prediction(Label::from(pred))
                .with_weight(w)
                .unwrap()
        })
        .collect();
    Dataset::new(records, favorable, groups)
}

fn unit_rows() -> impl Strategy<Value = Vec<Row>> {
    vec((any::<bool>(), any::<bool>(), any::<bool>(), Just(1.0)), 1..200)
}

fn weighted_rows() -> impl Strategy<Value = Vec<Row>> {
    vec((any::<bool>(), any::<bool>(), any::<bool>(), 0.1f64..5.0), 1..200)
}

fn favorable() -> impl Strategy<Value = Label> {
    any::<bool>().prop_map(Label::from)
}

fn all_cells_present(rows: &[Row]) -> bool {
    [(true, true), (true, false), (false, true), (false, false)]
        .iter()
        .all(|&(g, l)| rows.iter().any(|r| r.0 == g && r.1 == l))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // =============================================================================
    // Reweighing
    // =============================================================================

    #[test]
    fn prop_reweighing_preserves_total_weight(rows in weighted_rows(), fav in favorable()) {
        let mut ds = build(&rows, fav);
        let before = ds.total_weight();
        Reweighing::fit_transform(&mut ds).unwrap();
        let after = ds.total_weight();
        prop_assert!(
            (before - after).abs() <= 1e-9 * before.abs().max(1.0),
            "total weight {} became {}", before, after
        );
        prop_assert!(ds.weights().iter().all(|&w| w >= 0.0 && w.is_finite()));
    }

    #[test]
    fn prop_reweighing_zeroes_mean_difference(rows in unit_rows(), fav in favorable()) {
        prop_assume!(all_cells_present(&rows));
        let mut ds = build(&rows, fav);
        Reweighing::fit_transform(&mut ds).unwrap();
        let md = DatasetMetric::new(&ds).mean_difference().unwrap();
        prop_assert!(md.abs() < 1e-9, "mean difference after reweighing: {}", md);
    }

    #[test]
    fn prop_weights_uniform_within_cell(rows in unit_rows()) {
        let mut ds = build(&rows, Label::One);
        Reweighing::fit_transform(&mut ds).unwrap();
        for a in ds.records() {
            for b in ds.records() {
                if a.group == b.group && a.true_label == b.true_label {
                    prop_assert_eq!(a.weight(), b.weight());
                }
            }
        }
    }

    // =============================================================================
    // Symmetry under role swap
    // =============================================================================

    #[test]
    fn prop_swapping_roles_negates_label_metrics(rows in weighted_rows(), fav in favorable()) {
        let ds = build(&rows, fav);
        let swapped = ds.clone().with_groups(ds.groups().swapped());
        let (a, b) = (DatasetMetric::new(&ds), DatasetMetric::new(&swapped));

        if let (Ok(x), Ok(y)) = (a.mean_difference(), b.mean_difference()) {
            prop_assert!((x + y).abs() < 1e-12);
        }
        if let (Ok(x), Ok(y)) = (a.statistical_parity_difference(), b.statistical_parity_difference()) {
            prop_assert!((x + y).abs() < 1e-12);
        }
        if let (Ok(x), Ok(y)) = (a.disparate_impact(), b.disparate_impact()) {
            prop_assert!((x * y - 1.0).abs() < 1e-9, "DI {} swapped {}", x, y);
        }
    }

    #[test]
    fn prop_swapping_roles_negates_rate_differences(rows in weighted_rows(), fav in favorable()) {
        let ds = build(&rows, fav);
        let swapped = ds.clone().with_groups(ds.groups().swapped());
        let (a, b) = (ClassificationMetric::new(&ds), ClassificationMetric::new(&swapped));

        let pairs = [
            (a.false_positive_rate_difference(), b.false_positive_rate_difference()),
            (a.false_negative_rate_difference(), b.false_negative_rate_difference()),
            (a.equal_opportunity_difference(), b.equal_opportunity_difference()),
            (a.error_rate_difference(), b.error_rate_difference()),
        ];
        for (x, y) in pairs {
            prop_assert_eq!(x.is_ok(), y.is_ok());
            if let (Ok(x), Ok(y)) = (x, y) {
                prop_assert!((x + y).abs() < 1e-12);
            }
        }
        if let (Ok(x), Ok(y)) = (a.equalized_odds_difference(), b.equalized_odds_difference()) {
            prop_assert!((x - y).abs() < 1e-12);
        }
    }

    // =============================================================================
    // Range bounds
    // =============================================================================

    #[test]
    fn prop_rates_within_unit_interval(rows in weighted_rows(), fav in favorable()) {
        let ds = build(&rows, fav);
        let m = ClassificationMetric::new(&ds);
        for sel in [
            Selector::All,
            Selector::Role(GroupRole::Privileged),
            Selector::Role(GroupRole::Unprivileged),
        ] {
            let rates = [
                m.accuracy(&sel),
                m.precision(&sel),
                m.recall(&sel),
                m.false_positive_rate(&sel),
                m.false_negative_rate(&sel),
            ];
            for r in rates.into_iter().flatten() {
                prop_assert!((0.0..=1.0).contains(&r), "rate {} out of [0, 1] for {}", r, sel);
            }
        }
        let mean_diff = DatasetMetric::new(&ds).mean_difference();
        if let Ok(md) = mean_diff {
            prop_assert!((-1.0..=1.0).contains(&md));
        }
    }

    #[test]
    fn prop_recall_and_fnr_are_complements(rows in unit_rows()) {
        let ds = build(&rows, Label::One);
        let m = ClassificationMetric::new(&ds);
        if let (Ok(tpr), Ok(fnr)) = (m.recall(&Selector::All), m.false_negative_rate(&Selector::All)) {
            prop_assert!((tpr + fnr - 1.0).abs() < 1e-12);
        }
    }
}

use approx::assert_abs_diff_eq;

use bias_audit::{
    partition, AuditError, ClassificationMetric, Comparison, ConfusionMatrix, Dataset,
    DatasetMetric, GroupDefinition, GroupRole, Label, MetricOutcome, Record, Reweighing, Selector,
    Value,
};

fn binary_groups() -> GroupDefinition {
    GroupDefinition::from_roles([Value::from("priv")], [Value::from("unpriv")]).unwrap()
}

/// 4 privileged records labeled 1,1,0,0 and 4 unprivileged labeled 1,0,0,0.
fn scenario_a() -> Dataset {
    let records = [
        ("priv", 1),
        ("priv", 1),
        ("priv", 0),
        ("priv", 0),
        ("unpriv", 1),
        ("unpriv", 0),
        ("unpriv", 0),
        ("unpriv", 0),
    ]
    .iter()
    .map(|&(g, l)| Record::new(g, Label::from(l == 1)))
    .collect();
    Dataset::new(records, Label::One, binary_groups())
}

/// Scenario A with predictions [1,1,0,0] (priv) and [0,0,0,0] (unpriv).
fn scenario_b() -> Dataset {
    let mut ds = scenario_a();
    let preds = [1, 1, 0, 0, 0, 0, 0, 0].map(|p| Label::from(p == 1));
    ds.attach_predictions(&preds).unwrap();
    ds
}

#[test]
fn scenario_a_label_disparities() {
    let ds = scenario_a();
    let m = DatasetMetric::new(&ds);
    let base_rate = |role| m.base_rate(&Selector::Role(role)).unwrap();
    assert_abs_diff_eq!(base_rate(GroupRole::Privileged), 0.5);
    assert_abs_diff_eq!(base_rate(GroupRole::Unprivileged), 0.25);
    assert_abs_diff_eq!(m.mean_difference().unwrap(), -0.25);
    assert_abs_diff_eq!(m.disparate_impact().unwrap(), 0.5);
}

#[test]
fn scenario_b_equal_opportunity() {
    let ds = scenario_b();
    let m = ClassificationMetric::new(&ds);

    let cells = |cm: ConfusionMatrix| {
        (
            cm.true_positives,
            cm.false_positives,
            cm.false_negatives,
            cm.true_negatives,
        )
    };
    let priv_cm = m.confusion_matrix(&Selector::Role(GroupRole::Privileged)).unwrap();
    assert_eq!(cells(priv_cm), (2.0, 0.0, 0.0, 2.0));
    let unpriv_cm = m.confusion_matrix(&Selector::Role(GroupRole::Unprivileged)).unwrap();
    assert_eq!(cells(unpriv_cm), (0.0, 0.0, 1.0, 3.0));

    assert_abs_diff_eq!(m.recall(&Selector::Role(GroupRole::Privileged)).unwrap(), 1.0);
    assert_abs_diff_eq!(m.recall(&Selector::Role(GroupRole::Unprivileged)).unwrap(), 0.0);
    assert_abs_diff_eq!(m.equal_opportunity_difference().unwrap(), -1.0);
    assert_abs_diff_eq!(m.equalized_odds_difference().unwrap(), 1.0);
}

#[test]
fn scenario_b_statistical_parity_differs_from_mean_difference() {
    let ds = scenario_b();
    let m = DatasetMetric::new(&ds);
    assert_abs_diff_eq!(m.mean_difference().unwrap(), -0.25);
    assert_abs_diff_eq!(m.statistical_parity_difference().unwrap(), -0.5);
}

#[test]
fn scenario_b_label_and_decision_impact_keep_separate_keys() {
    let ds = scenario_b();
    let mut report = DatasetMetric::new(&ds).report();
    report.extend(ClassificationMetric::new(&ds).report());

    // labels: 0.25 / 0.5; decisions: 0 / 0.5
    assert_abs_diff_eq!(report.value("disparate_impact"), 0.5);
    assert_eq!(report.value("predicted_disparate_impact"), 0.0);
    assert!(report.value("predicted_disparate_impact").is_sign_positive());
}

#[test]
fn scenario_c_reweighing_reaches_independence() {
    let mut ds = scenario_a();
    let before = ds.total_weight();
    Reweighing::fit_transform(&mut ds).unwrap();

    assert_abs_diff_eq!(ds.total_weight(), before, epsilon = 1e-9);
    let md = DatasetMetric::new(&ds).mean_difference().unwrap();
    assert_abs_diff_eq!(md, 0.0, epsilon = 1e-12);

    // each group's weighted label-1 mass equals n_g * n_1 / n = 4 * 3 / 8
    let parts = partition(&ds).unwrap();
    for part in [&parts.privileged, &parts.unprivileged] {
        assert_abs_diff_eq!(part.label_mass(Label::One), 1.5, epsilon = 1e-12);
    }
    // uniform within a cell
    let w = ds.weights();
    assert_abs_diff_eq!(w[0], w[1]);
    assert_abs_diff_eq!(w[5], w[7]);
    assert_abs_diff_eq!(w[4], 1.5, epsilon = 1e-12);
}

#[test]
fn reweighing_leaves_predictions_and_labels_alone() {
    let mut ds = scenario_b();
    let labels = |ds: &Dataset| -> Vec<(Label, Option<Label>)> {
        ds.records()
            .iter()
            .map(|r| (r.true_label, r.predicted_label()))
            .collect()
    };
    let before = labels(&ds);
    Reweighing::fit_transform(&mut ds).unwrap();
    assert_eq!(labels(&ds), before);
    assert_eq!(ds.len(), 8);
}

#[test]
fn empty_unprivileged_partition() {
    let records = (0..4)
        .map(|i| Record::new("priv", Label::from(i % 2 == 0)).with_prediction(Label::One))
        .collect();
    let ds = Dataset::new(records, Label::One, binary_groups());

    let dm = DatasetMetric::new(&ds);
    assert!(matches!(
        dm.base_rate(&Selector::Role(GroupRole::Unprivileged)),
        Err(AuditError::EmptyGroup(_))
    ));
    assert!(matches!(dm.mean_difference(), Err(AuditError::EmptyGroup(_))));
    assert!(matches!(dm.disparate_impact(), Err(AuditError::EmptyGroup(_))));

    let cm = ClassificationMetric::new(&ds);
    assert!(matches!(
        cm.false_positive_rate(&Selector::Role(GroupRole::Unprivileged)),
        Err(AuditError::EmptyGroup(_))
    ));
    assert!(matches!(cm.equal_opportunity_difference(), Err(AuditError::EmptyGroup(_))));

    let report = dm.report();
    assert!(matches!(
        report.get("mean_difference"),
        Some(MetricOutcome::Undefined { .. })
    ));
    assert!(report.value("mean_difference").is_nan());
}

#[test]
fn swapping_roles_negates_differences_and_inverts_impact() {
    let ds = scenario_b();
    let swapped = ds.clone().with_groups(ds.groups().swapped());

    let (a, b) = (DatasetMetric::new(&ds), DatasetMetric::new(&swapped));
    assert_abs_diff_eq!(a.mean_difference().unwrap(), -b.mean_difference().unwrap());
    assert_abs_diff_eq!(
        a.statistical_parity_difference().unwrap(),
        -b.statistical_parity_difference().unwrap()
    );
    assert_abs_diff_eq!(b.disparate_impact().unwrap(), 1.0 / a.disparate_impact().unwrap());

    let (a, b) = (ClassificationMetric::new(&ds), ClassificationMetric::new(&swapped));
    assert_abs_diff_eq!(
        a.equal_opportunity_difference().unwrap(),
        -b.equal_opportunity_difference().unwrap()
    );
    assert_abs_diff_eq!(
        a.false_negative_rate_difference().unwrap(),
        -b.false_negative_rate_difference().unwrap()
    );
}

#[test]
fn unknown_group_fails_one_metric_not_the_batch() {
    let mut records = scenario_a().records().to_vec();
    records.push(Record::new("other", Label::One));
    let ds = Dataset::new(records, Label::One, binary_groups());

    let report = DatasetMetric::new(&ds).report();
    assert_eq!(report.len(), 3);
    assert!(report.iter().all(|(_, o)| o.is_failed()));
    assert_eq!(
        Reweighing::fit(&ds).unwrap_err(),
        AuditError::UnknownGroup(Value::from("other"))
    );
}

#[test]
fn n_way_groups_compare_against_the_privileged_reference() {
    let groups = GroupDefinition::from_roles(
        [Value::from("white")],
        [Value::from("black"), Value::from("hispanic")],
    )
    .unwrap();
    let rows = [
        ("white", 1),
        ("white", 1),
        ("white", 0),
        ("white", 0),
        ("black", 1),
        ("black", 0),
        ("black", 0),
        ("black", 0),
        ("hispanic", 1),
        ("hispanic", 1),
        ("hispanic", 1),
        ("hispanic", 0),
    ];
    let records = rows
        .iter()
        .map(|&(g, l)| Record::new(g, Label::from(l == 1)))
        .collect();
    let mut ds = Dataset::new(records, Label::One, groups);

    // pooled unprivileged rate 4/8 equals privileged 2/4
    assert_abs_diff_eq!(DatasetMetric::new(&ds).mean_difference().unwrap(), 0.0);

    let versus = |ds: &Dataset, g: &str| {
        DatasetMetric::new(ds)
            .with_comparison(Comparison::group_vs_privileged(Value::from(g)))
            .mean_difference()
            .unwrap()
    };
    assert_abs_diff_eq!(versus(&ds, "black"), -0.25);
    assert_abs_diff_eq!(versus(&ds, "hispanic"), 0.25);

    Reweighing::fit_transform(&mut ds).unwrap();
    assert_abs_diff_eq!(ds.total_weight(), 12.0, epsilon = 1e-9);
    for g in ["black", "hispanic"] {
        assert_abs_diff_eq!(versus(&ds, g), 0.0, epsilon = 1e-12);
    }
}

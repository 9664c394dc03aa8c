//! Validation pass tests: pruning, reporting and the fixed-point property.

#[cfg(test)]
mod tests {
    use crate::document::DocSnapshot;
    use crate::mapping::{LayoutMap, ValueFragment};
    use crate::test_fixtures::*;
    use crate::validate::{
        clean_layout_maps, validate_layout_map, validate_layout_maps, RemovedDependent,
        RemovedDependentGroup, RemovedVariableValue,
    };

    /// Every id that survives must exist in the snapshot.
    fn assert_sound(map: &LayoutMap, doc: &DocSnapshot) {
        let index = doc.index();
        for id in &map.layout_ids {
            assert!(index.has_layout(id), "dangling layout {}", id);
        }
        for target in &map.variables {
            if let Some(id) = &target.id {
                assert!(index.has_variable(id), "dangling target {}", id);
            }
            for group in &target.dependent_group {
                for dependent in &group.dependents {
                    assert!(index.has_variable(&dependent.variable_id));
                }
                for fragment in &group.variable_value {
                    if let ValueFragment::Variable(r) = fragment {
                        if let Some(id) = &r.id {
                            assert!(index.has_variable(id), "dangling reference {}", id);
                        }
                    }
                }
            }
        }
    }

    fn messy_map() -> LayoutMap {
        layout_map(
            "m1",
            &["L1", "gone-layout", "L2"],
            vec![
                target("missing", vec![group(vec![], vec![text("never")])]),
                target(
                    "hero",
                    vec![
                        group(
                            vec![dependent("color", &["red"]), dependent("ghost", &["x"])],
                            vec![text("hero-"), var_ref("name", vec![]), var_ref("phantom", vec![])],
                        ),
                        group(vec![dependent("ghost", &["y"])], vec![var_ref("phantom", vec![])]),
                        group(vec![], vec![text("fallback")]),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_dangling_target_variable_is_dropped() {
        let doc = sample_doc();
        let map = layout_map(
            "m1",
            &["L1"],
            vec![
                target("missing", vec![group(vec![], vec![text("x")])]),
                target("hero", vec![group(vec![], vec![text("y")])]),
            ],
        );

        let outcome = validate_layout_map(&map, &doc);
        assert_eq!(outcome.report.removed_variables, vec!["missing"]);
        assert_eq!(outcome.clean_layout_map.variables.len(), 1);
        assert_eq!(outcome.clean_layout_map.variables[0].id.as_deref(), Some("hero"));
    }

    #[test]
    fn test_unknown_layout_id_is_dropped() {
        let doc = sample_doc();
        let map = layout_map("m1", &["L1", "L9"], vec![]);

        let outcome = validate_layout_map(&map, &doc);
        assert_eq!(outcome.clean_layout_map.layout_ids, vec!["L1"]);
        assert_eq!(outcome.report.removed_layout_ids, vec!["L9"]);
    }

    #[test]
    fn test_dependents_and_references_are_reported() {
        let doc = sample_doc();
        let outcome = validate_layout_map(&messy_map(), &doc);
        let report = &outcome.report;

        assert_eq!(report.removed_layout_ids, vec!["gone-layout"]);
        assert_eq!(report.removed_variables, vec!["missing"]);
        assert_eq!(
            report.removed_dependents,
            vec![
                RemovedDependent {
                    variable_id: "ghost".to_string(),
                    image_variable_id: Some("hero".to_string()),
                },
                RemovedDependent {
                    variable_id: "ghost".to_string(),
                    image_variable_id: Some("hero".to_string()),
                },
            ]
        );
        assert_eq!(
            report.removed_variable_values,
            vec![
                RemovedVariableValue {
                    value: "phantom".to_string(),
                    image_variable_id: Some("hero".to_string()),
                    dependent_group_index: 0,
                },
                RemovedVariableValue {
                    value: "phantom".to_string(),
                    image_variable_id: Some("hero".to_string()),
                    dependent_group_index: 1,
                },
            ]
        );
        assert_eq!(
            report.removed_dependent_groups,
            vec![RemovedDependentGroup {
                image_variable_id: Some("hero".to_string()),
                dependent_group_index: 1,
            }]
        );

        let hero = outcome.clean_layout_map.target("hero").unwrap();
        assert_eq!(hero.dependent_group.len(), 2);
        assert_eq!(hero.dependent_group[0].dependents.len(), 1);
        assert_eq!(hero.dependent_group[0].variable_value.len(), 2);
        assert_eq!(hero.dependent_group[1].variable_value, vec![text("fallback")]);
    }

    #[test]
    fn test_removals_match_structural_difference() {
        let doc = sample_doc();
        let input = messy_map();
        let outcome = validate_layout_map(&input, &doc);

        let count = |map: &LayoutMap| {
            let mut n = map.layout_ids.len() + map.variables.len();
            for target in &map.variables {
                n += target.dependent_group.len();
                for group in &target.dependent_group {
                    n += group.dependents.len();
                    n += group
                        .variable_value
                        .iter()
                        .filter(|f| matches!(f, ValueFragment::Variable(_)))
                        .count();
                }
            }
            n
        };

        // The dropped target carries one group, which disappears with it
        // without a separate report entry.
        let removed_with_target = 1;
        assert_eq!(
            count(&input) - count(&outcome.clean_layout_map),
            outcome.report.removal_count() + removed_with_target
        );
    }

    #[test]
    fn test_clean_map_is_sound_and_fixed_point() {
        let doc = sample_doc();
        let first = validate_layout_map(&messy_map(), &doc);
        assert_sound(&first.clean_layout_map, &doc);

        let second = validate_layout_map(&first.clean_layout_map, &doc);
        assert!(second.report.is_empty(), "{:?}", second.report);
        assert_eq!(second.clean_layout_map, first.clean_layout_map);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let doc = sample_doc();
        let input = messy_map();
        let snapshot = input.clone();
        let _ = validate_layout_map(&input, &doc);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_target_without_id_is_kept() {
        let doc = sample_doc();
        let mut map = layout_map("m1", &["L1"], vec![target("hero", vec![group(vec![], vec![text("x")])])]);
        map.variables[0].id = None;

        let outcome = validate_layout_map(&map, &doc);
        assert!(outcome.report.is_empty());
        assert_eq!(outcome.clean_layout_map.variables.len(), 1);
    }

    #[test]
    fn test_set_validation_keeps_order_and_merges_report() {
        let doc = sample_doc();
        let maps = vec![
            layout_map("a", &["L1", "X1"], vec![]),
            layout_map("b", &["L2"], vec![]),
            layout_map("c", &["X2", "L3"], vec![]),
        ];

        let outcomes = validate_layout_maps(&maps, &doc);
        let ids: Vec<&str> = outcomes.iter().map(|o| o.clean_layout_map.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let (clean, report) = clean_layout_maps(&maps, &doc);
        assert_eq!(clean[2].layout_ids, vec!["L3"]);
        assert_eq!(report.removed_layout_ids, vec!["X1", "X2"]);
    }

    #[test]
    fn test_report_wire_shape() {
        let doc = sample_doc();
        let outcome = validate_layout_map(&layout_map("m1", &["L9"], vec![]), &doc);
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["cleanLayoutMap"]["layoutIds"], serde_json::json!([]));
        assert_eq!(json["report"]["removedLayoutIds"], serde_json::json!(["L9"]));
        assert_eq!(json["report"]["removedVariables"], serde_json::json!([]));
        assert_eq!(json["report"]["removedDependents"], serde_json::json!([]));
        assert_eq!(json["report"]["removedVariableValues"], serde_json::json!([]));
    }
}

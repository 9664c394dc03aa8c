//! Compiler tests: key construction, combination expansion, merge order.

#[cfg(test)]
mod tests {
    use crate::compile::{
        combinations, compile_rules, layout_mapping_to_action_map, ActionMap, ALWAYS_RUN_KEY,
    };
    use crate::mapping::TransformCommand;
    use crate::test_fixtures::*;
    use serde_json::json;

    fn compile_one(map: crate::mapping::LayoutMap) -> ActionMap {
        layout_mapping_to_action_map(&[map], &sample_doc())
    }

    #[test]
    fn test_two_by_two_expands_to_four_value_keys() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target(
                "hero",
                vec![group(
                    vec![dependent("letter", &["a", "b"]), dependent("axis", &["x", "y"])],
                    vec![text("pick")],
                )],
            )],
        ));

        let table = action_map
            .rules("Square", "Hero")
            .and_then(|rules| rules.get("Letter|Axis"))
            .unwrap();
        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a|x", "a|y", "b|x", "b|y"]);
        assert!(table.values().all(|entry| entry.value == "pick"));
    }

    #[test]
    fn test_empty_dependents_compile_to_empty_keys() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target("hero", vec![group(vec![], vec![text("fixed")])])],
        ));

        let entry = action_map.entry("Square", "Hero", "", "").unwrap();
        assert_eq!(entry.value, "fixed");
        assert!(entry.transforms.is_empty());
        assert_eq!(action_map.entry_count(), 1);
    }

    #[test]
    fn test_template_and_transforms_resolve_to_names() {
        let swap = TransformCommand::new("x", "y", true);
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target(
                "hero",
                vec![group(vec![], vec![text("Hello "), var_ref("name", vec![swap.clone()])])],
            )],
        ));

        let entry = action_map.entry("Square", "Hero", "", "").unwrap();
        assert_eq!(entry.value, "Hello ${Name}");
        assert_eq!(entry.transforms.get("Name"), Some(&vec![swap]));
    }

    #[test]
    fn test_unresolved_reference_is_left_out_of_template() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target(
                "hero",
                vec![group(vec![], vec![text("a-"), var_ref("phantom", vec![]), text("-b")])],
            )],
        ));

        let entry = action_map.entry("Square", "Hero", "", "").unwrap();
        assert_eq!(entry.value, "a--b");
        assert!(entry.transforms.is_empty());
    }

    #[test]
    fn test_always_run_group_uses_reserved_key() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target("hero", vec![always_run(vec![text("always")])])],
        ));

        let rules = action_map.rules("Square", "Hero").unwrap();
        assert_eq!(rules.keys().collect::<Vec<_>>(), vec![ALWAYS_RUN_KEY]);
        assert_eq!(action_map.entry("Square", "Hero", ALWAYS_RUN_KEY, "").unwrap().value, "always");
    }

    #[test]
    fn test_unresolved_dependent_skips_whole_group() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target(
                "hero",
                vec![
                    group(
                        vec![dependent("color", &["red"]), dependent("ghost", &["x"])],
                        vec![text("broken")],
                    ),
                    group(vec![dependent("color", &["blue"])], vec![text("ok")]),
                ],
            )],
        ));

        let rules = action_map.rules("Square", "Hero").unwrap();
        assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["Color"]);
        assert_eq!(rules["Color"].keys().collect::<Vec<_>>(), vec!["blue"]);
    }

    #[test]
    fn test_missing_layout_and_target_write_nothing() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L9"],
            vec![target("hero", vec![group(vec![], vec![text("x")])])],
        ));
        assert!(action_map.is_empty());

        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target("missing", vec![group(vec![], vec![text("x")])])],
        ));
        assert!(action_map.is_empty());
    }

    #[test]
    fn test_dependent_order_is_part_of_the_key() {
        let action_map = compile_one(layout_map(
            "m1",
            &["L1"],
            vec![target(
                "hero",
                vec![group(
                    vec![dependent("size", &["m"]), dependent("color", &["red"])],
                    vec![text("x")],
                )],
            )],
        ));

        assert!(action_map.entry("Square", "Hero", "Size|Color", "m|red").is_some());
        assert!(action_map.entry("Square", "Hero", "Color|Size", "red|m").is_none());
    }

    #[test]
    fn test_identical_key_last_write_wins_in_place() {
        let doc = sample_doc();
        let maps = vec![
            layout_map(
                "m1",
                &["L1"],
                vec![target(
                    "hero",
                    vec![
                        group(vec![dependent("color", &["red"])], vec![text("first")]),
                        group(vec![dependent("color", &["blue"])], vec![text("blue")]),
                    ],
                )],
            ),
            layout_map(
                "m2",
                &["L1"],
                vec![target(
                    "hero",
                    vec![
                        group(vec![dependent("color", &["red"])], vec![text("second")]),
                        group(vec![dependent("size", &["s"])], vec![text("sized")]),
                    ],
                )],
            ),
        ];

        let action_map = layout_mapping_to_action_map(&maps, &doc);
        let rules = action_map.rules("Square", "Hero").unwrap();
        assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["Color", "Size"]);
        assert_eq!(rules["Color"].keys().collect::<Vec<_>>(), vec!["red", "blue"]);
        assert_eq!(rules["Color"]["red"].value, "second");
        assert_eq!(rules["Size"]["s"].value, "sized");
    }

    #[test]
    fn test_layouts_with_same_name_merge() {
        let mut doc = sample_doc();
        doc.layouts.push(layout("L4", "Square"));
        let maps = vec![
            layout_map("m1", &["L1"], vec![target("hero", vec![group(vec![dependent("color", &["red"])], vec![text("r")])])]),
            layout_map("m2", &["L4"], vec![target("logo", vec![group(vec![], vec![text("l")])])]),
        ];

        let action_map = layout_mapping_to_action_map(&maps, &doc);
        assert_eq!(action_map.0.len(), 1);
        let square = action_map.layout("Square").unwrap();
        assert_eq!(square.keys().collect::<Vec<_>>(), vec!["Hero", "Logo"]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let doc = sample_doc();
        let maps = sample_maps();
        let first = layout_mapping_to_action_map(&maps, &doc);
        let second = layout_mapping_to_action_map(&maps, &doc);
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_rules_carry_origin() {
        let rules = compile_rules(&sample_maps(), &sample_doc());
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1].origin.layout_map_id, "m1");
        assert_eq!(rules[1].origin.target_variable_id, "hero");
        assert_eq!(rules[1].origin.group_index, 1);
        assert_eq!(rules[2].dependent_key, "");
    }

    #[test]
    fn test_action_map_wire_shape() {
        let action_map = layout_mapping_to_action_map(&sample_maps(), &sample_doc());
        assert_eq!(
            serde_json::to_value(&action_map).unwrap(),
            json!({
                "Square": {
                    "Hero": {
                        "Color": {
                            "red": { "value": "hero-red", "transforms": {} },
                            "blue": { "value": "hero-blue", "transforms": {} }
                        }
                    },
                    "Logo": {
                        "": { "": { "value": "logo-fixed", "transforms": {} } }
                    }
                }
            })
        );

        let text = action_map.to_json().unwrap();
        let round: ActionMap = serde_json::from_str(&text).unwrap();
        assert_eq!(round, action_map);
    }

    #[test]
    fn test_combinations_edges() {
        let none: Vec<Vec<&str>> = vec![];
        assert_eq!(combinations(&none), vec![Vec::<String>::new()]);

        let with_empty_axis = vec![vec!["a"], vec![]];
        assert!(combinations(&with_empty_axis).is_empty());
    }
}

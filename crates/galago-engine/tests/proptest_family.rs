//! Property-based tests for family narrowing and compatible-choice
//! selection.

use proptest::prelude::*;

use galago_engine::coloring::{Color, Coloring};
use galago_family::family::Family;
use galago_family::quotient::RowGroups;

#[derive(Debug, Clone)]
struct ColoringCase {
    hole_domains: Vec<usize>,
    group_sizes: Vec<usize>,
    colors: Vec<Color>,
    /// Per-hole admissible subsets for the narrowed family.
    narrowed: Vec<Vec<usize>>,
}

fn coloring_case() -> impl Strategy<Value = ColoringCase> {
    let domains = prop::collection::vec(1usize..4, 1..4);
    let groups = prop::collection::vec(1usize..4, 1..6);
    (domains, groups).prop_flat_map(|(hole_domains, group_sizes)| {
        let num_choices: usize = group_sizes.iter().sum();
        let num_holes = hole_domains.len();
        let color = {
            let hole_domains = hole_domains.clone();
            prop::collection::vec((0..num_holes, 0usize..4), 0..=num_holes).prop_map(
                move |pairs| {
                    let mut color: Color = pairs
                        .into_iter()
                        .map(|(hole, option)| (hole, option % hole_domains[hole]))
                        .collect();
                    color.sort();
                    color.dedup_by_key(|&mut (hole, _)| hole);
                    color
                },
            )
        };
        let colors = prop::collection::vec(color, num_choices);
        let narrowed = {
            let hole_domains = hole_domains.clone();
            hole_domains
                .iter()
                .map(|&n| prop::collection::btree_set(0..n, 0..=n))
                .collect::<Vec<_>>()
                .prop_map(|sets| {
                    sets.into_iter()
                        .map(|set| set.into_iter().collect::<Vec<_>>())
                        .collect::<Vec<_>>()
                })
        };
        (colors, narrowed).prop_map(move |(colors, narrowed)| ColoringCase {
            hole_domains: hole_domains.clone(),
            group_sizes: group_sizes.clone(),
            colors,
            narrowed,
        })
    })
}

fn build(case: &ColoringCase) -> (Family, Family, Coloring) {
    let mut family = Family::new();
    for &n in &case.hole_domains {
        family.add_hole(n);
    }
    let mut narrowed = family.clone();
    for (hole, options) in case.narrowed.iter().enumerate() {
        narrowed.hole_set_options(hole, options);
    }
    let row_groups = RowGroups::from_group_sizes(&case.group_sizes);
    let coloring = Coloring::new(&family, row_groups, case.colors.clone());
    (family, narrowed, coloring)
}

proptest! {
    /// Narrowed families are subsets of their root.
    #[test]
    fn narrowing_produces_subset_families(case in coloring_case()) {
        let (family, narrowed, _) = build(&case);
        prop_assert!(narrowed.is_subset_of(&family));
        prop_assert!(family.is_subset_of(&family));
    }

    /// `A.is_subset_of(B)` implies selection over A is a subset of
    /// selection over B.
    #[test]
    fn compatible_choices_are_monotone(case in coloring_case()) {
        let (family, narrowed, coloring) = build(&case);
        let wide = coloring.select_compatible_choices(&family);
        let tight = coloring.select_compatible_choices(&narrowed);
        prop_assert!(tight.is_subset_of(&wide));
    }

    /// Uncolored choices survive every narrowing.
    #[test]
    fn uncolored_choices_always_survive(case in coloring_case()) {
        let (_, narrowed, coloring) = build(&case);
        let selected = coloring.select_compatible_choices(&narrowed);
        for (choice, color) in coloring.choice_to_assignment().iter().enumerate() {
            if color.is_empty() {
                prop_assert!(selected.contains(choice));
            }
        }
    }

    /// Collected options stay within each hole's total domain and within
    /// the colors of the selected choices.
    #[test]
    fn collected_options_stay_in_domain(case in coloring_case()) {
        let (family, _, coloring) = build(&case);
        let selected = coloring.select_compatible_choices(&family);
        let collected = coloring.collect_hole_options(&selected);
        for (hole, options) in collected.iter().enumerate() {
            for &option in options {
                prop_assert!(option < family.hole_num_options_total(hole));
            }
        }
    }
}

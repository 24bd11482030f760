// Integration tests for Shelter Match

use proptest::prelude::*;
use shelter_match::core::{filters::matches_criteria, DistanceUnit, RankingPipeline};
use shelter_match::models::{Eligibility, FilterCriteria, GeoPoint, Shelter};
use uuid::Uuid;

fn create_test_shelter(title: &str, lat: f64, lon: f64, open_beds: i32) -> Shelter {
    Shelter {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: String::new(),
        address: format!("{} Street", title),
        phone: None,
        website: None,
        latitude: lat,
        longitude: lon,
        total_beds: 10,
        open_beds,
        eligibility: Eligibility::default(),
        age_min: None,
        age_max: None,
        created_at: None,
        updated_at: None,
    }
}

fn titles(pipeline: &RankingPipeline, shelters: Vec<Shelter>, criteria: &FilterCriteria, location: Option<GeoPoint>) -> Vec<String> {
    pipeline
        .rank(shelters, criteria, location)
        .results
        .into_iter()
        .map(|r| r.shelter.title)
        .collect()
}

#[test]
fn test_integration_end_to_end_ranking() {
    let pipeline = RankingPipeline::new(DistanceUnit::Kilometers);
    let searcher = GeoPoint { lat: 40.7128, lng: -74.0060 };

    let mut family = create_test_shelter("Family Haven", 40.80, -73.95, 3);
    family.eligibility.families = true;
    let mut far_family = create_test_shelter("Far Family", 41.50, -73.00, 2);
    far_family.eligibility.families = true;
    let near_single = create_test_shelter("Near Single", 40.713, -74.006, 4);

    let criteria = FilterCriteria {
        required: Eligibility {
            families: true,
            ..Eligibility::default()
        },
        ..FilterCriteria::default()
    };

    let ranked = pipeline.rank(vec![near_single, far_family, family], &criteria, Some(searcher));

    assert_eq!(ranked.results.len(), 3);
    let order: Vec<&str> = ranked.results.iter().map(|r| r.shelter.title.as_str()).collect();
    assert_eq!(order, vec!["Family Haven", "Far Family", "Near Single"]);

    assert!(ranked.results[0].is_match && ranked.results[1].is_match);
    assert!(!ranked.results[2].is_match, "non-matches are demoted, not dropped");

    // Distances are non-decreasing within the match group
    let d0 = ranked.results[0].distance.unwrap();
    let d1 = ranked.results[1].distance.unwrap();
    assert!(d0 <= d1, "{} > {}", d0, d1);

    assert_eq!(ranked.summary.total_shelters, 3);
    assert_eq!(ranked.summary.matching_shelters, 2);
    assert_eq!(ranked.summary.open_beds_in_matches, 5);
}

#[test]
fn test_input_order_kept_without_location() {
    let pipeline = RankingPipeline::default();
    let shelters = vec![
        create_test_shelter("C", 10.0, 10.0, 0),
        create_test_shelter("A", 20.0, 20.0, 1),
        create_test_shelter("B", 30.0, 30.0, 0),
        create_test_shelter("D", 40.0, 40.0, 2),
    ];

    let criteria = FilterCriteria {
        beds_available_only: true,
        ..FilterCriteria::default()
    };
    let ranked = pipeline.rank(shelters, &criteria, None);

    let order: Vec<&str> = ranked.results.iter().map(|r| r.shelter.title.as_str()).collect();
    assert_eq!(order, vec!["A", "D", "C", "B"]);
    assert!(ranked.results.iter().all(|r| r.distance.is_none()));
}

#[test]
fn test_distance_reported_in_configured_unit() {
    let searcher = GeoPoint { lat: 51.5074, lng: -0.1278 };
    let paris = create_test_shelter("Paris", 48.8566, 2.3522, 1);

    let km = RankingPipeline::new(DistanceUnit::Kilometers).rank(vec![paris.clone()], &FilterCriteria::default(), Some(searcher));
    let mi = RankingPipeline::new(DistanceUnit::Miles).rank(vec![paris], &FilterCriteria::default(), Some(searcher));

    let km = km.results[0].distance.unwrap();
    let mi = mi.results[0].distance.unwrap();
    assert!((km - 343.5).abs() < 5.0, "London-Paris was {} km", km);
    assert!((mi - 213.5).abs() < 5.0, "London-Paris was {} mi", mi);
}

#[test]
fn test_malformed_coordinates_sort_last() {
    let pipeline = RankingPipeline::default();
    let searcher = GeoPoint { lat: 0.0, lng: 0.0 };

    let broken = create_test_shelter("Broken", f64::NAN, 0.0, 1);
    let near = create_test_shelter("Near", 0.1, 0.1, 1);
    let far = create_test_shelter("Far", 5.0, 5.0, 1);

    let order = titles(&pipeline, vec![broken, far, near], &FilterCriteria::default(), Some(searcher));
    assert_eq!(order, vec!["Near", "Far", "Broken"]);
}

#[test]
fn test_empty_directory() {
    let ranked = RankingPipeline::default().rank(Vec::new(), &FilterCriteria::default(), None);
    assert!(ranked.results.is_empty());
    assert_eq!(ranked.summary.total_shelters, 0);
}

#[test]
fn test_age_scenario_from_search_request() {
    let pipeline = RankingPipeline::default();

    let mut adults = create_test_shelter("Adults", 0.0, 0.0, 1);
    adults.age_min = Some(18);
    adults.age_max = Some(65);
    let mut youth = create_test_shelter("Youth", 0.0, 0.0, 1);
    youth.age_max = Some(20);

    let criteria = FilterCriteria {
        age_min: Some(25),
        ..FilterCriteria::default()
    };
    let ranked = pipeline.rank(vec![youth, adults], &criteria, None);

    assert_eq!(ranked.results[0].shelter.title, "Adults");
    assert!(ranked.results[0].is_match);
    assert!(!ranked.results[1].is_match);
}

fn arb_shelter() -> impl Strategy<Value = Shelter> {
    (-60.0f64..60.0, -170.0f64..170.0, 0i32..4, any::<bool>()).prop_map(|(lat, lon, open_beds, families)| {
        let mut shelter = create_test_shelter("Generated", lat, lon, open_beds);
        shelter.eligibility.families = families;
        shelter
    })
}

proptest! {
    #[test]
    fn prop_ranking_orders_matches_then_distance(
        shelters in prop::collection::vec(arb_shelter(), 0..40),
        lat in -60.0f64..60.0,
        lon in -170.0f64..170.0,
        families in any::<bool>(),
        beds_available_only in any::<bool>(),
    ) {
        let criteria = FilterCriteria {
            required: Eligibility {
                families,
                ..Eligibility::default()
            },
            beds_available_only,
            ..FilterCriteria::default()
        };
        let expected_matches = shelters.iter().filter(|s| matches_criteria(s, &criteria)).count();

        let ranked = RankingPipeline::default().rank(shelters.clone(), &criteria, Some(GeoPoint { lat, lng: lon }));

        prop_assert_eq!(ranked.results.len(), shelters.len());
        prop_assert_eq!(ranked.summary.matching_shelters, expected_matches);

        for result in &ranked.results {
            prop_assert_eq!(result.is_match, matches_criteria(&result.shelter, &criteria));
        }

        let first_non_match = ranked.results.iter().position(|r| !r.is_match).unwrap_or(ranked.results.len());
        prop_assert!(ranked.results[first_non_match..].iter().all(|r| !r.is_match));

        for pair in ranked.results.windows(2) {
            if pair[0].is_match == pair[1].is_match {
                let (a, b) = (pair[0].distance.unwrap(), pair[1].distance.unwrap());
                prop_assert!(a <= b, "{} > {}", a, b);
            }
        }
    }
}

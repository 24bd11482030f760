use crate::models::{Eligibility, FilterCriteria, Shelter};

/// Check whether a shelter satisfies every filter criterion
///
/// Stages run in order and stop at the first failure:
/// 1. Free-text search on title and address
/// 2. Required eligibility flags
/// 3. Age range intersection
/// 4. Open beds, when requested
#[inline]
pub fn matches_criteria(shelter: &Shelter, criteria: &FilterCriteria) -> bool {
    matches_search_text(shelter, criteria.search_text.as_deref())
        && matches_eligibility(&shelter.eligibility, &criteria.required)
        && matches_age_range(shelter, criteria.age_min, criteria.age_max)
        && (!criteria.beds_available_only || shelter.has_open_beds())
}

/// Case-insensitive substring search over `"{title} {address}"`.
///
/// Blank search text matches everything.
#[inline]
pub fn matches_search_text(shelter: &Shelter, search_text: Option<&str>) -> bool {
    let needle = match search_text.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_lowercase(),
        _ => return true,
    };

    let haystack = format!("{} {}", shelter.title, shelter.address).to_lowercase();
    haystack.contains(&needle)
}

/// Every flag requested `true` must be offered. Unrequested flags impose nothing.
#[inline]
pub fn matches_eligibility(offered: &Eligibility, required: &Eligibility) -> bool {
    required
        .pairs(offered)
        .iter()
        .all(|&(requested, available)| !requested || available)
}

/// Check the requested age bounds against the shelter's admitted range
///
/// Each requested bound must lie inside the shelter's range. An unset bound on
/// either side imposes no constraint.
#[inline]
pub fn matches_age_range(shelter: &Shelter, age_min: Option<i32>, age_max: Option<i32>) -> bool {
    [age_min, age_max]
        .into_iter()
        .flatten()
        .all(|age| age_within(age, shelter.age_min, shelter.age_max))
}

#[inline]
fn age_within(age: i32, lower: Option<i32>, upper: Option<i32>) -> bool {
    if lower.is_some_and(|min| age < min) {
        return false;
    }
    if upper.is_some_and(|max| age > max) {
        return false;
    }
    true
}

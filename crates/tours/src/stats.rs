//! Reporting aggregates over the tour catalogue.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use tourbook_core::{DomainError, DomainResult};

use crate::Tour;

/// Only well-rated tours count towards difficulty stats.
const STATS_MIN_RATING: f64 = 4.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: usize,
    pub num_ratings: u64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Group tours rated at least 4.5 by upper-cased difficulty, cheapest average first.
pub fn tour_stats(tours: &[Tour]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<&'static str, Vec<&Tour>> = BTreeMap::new();
    for tour in tours.iter().filter(|t| t.ratings_average >= STATS_MIN_RATING) {
        groups.entry(tour.difficulty.as_str()).or_default().push(tour);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, members)| {
            let n = members.len() as f64;
            DifficultyStats {
                difficulty: difficulty.to_uppercase(),
                num_tours: members.len(),
                num_ratings: members.iter().map(|t| u64::from(t.ratings_quantity)).sum(),
                avg_rating: members.iter().map(|t| t.ratings_average).sum::<f64>() / n,
                avg_price: members.iter().map(|t| t.price).sum::<f64>() / n,
                min_price: members.iter().map(|t| t.price).fold(f64::INFINITY, f64::min),
                max_price: members.iter().map(|t| t.price).fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect();
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: usize,
    pub tours: Vec<String>,
}

/// Tour starts per month of `year`, busiest month first (at most 12 rows).
pub fn monthly_plan(tours: &[Tour], year: i32) -> DomainResult<Vec<MonthlyPlan>> {
    if !(2000..=2100).contains(&year) {
        return Err(DomainError::validation("Invalid year: Year must be between 2000 and 2100"));
    }

    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        for start in tour.start_dates.iter().filter(|d| d.year() == year) {
            months.entry(start.month()).or_default().push(tour.name.clone());
        }
    }

    let mut plan: Vec<MonthlyPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthlyPlan {
            month,
            num_tour_starts: tours.len(),
            tours,
        })
        .collect();
    // Stable sort keeps month order among ties.
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plan.truncate(12);
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Difficulty;
    use crate::tour::tests::tour;
    use chrono::{TimeZone, Utc};

    #[test]
    fn stats_group_by_difficulty_and_skip_low_ratings() {
        let mut a = tour("The Forest Hiker", 397.0);
        a.apply_ratings(10, 4.8);
        let mut b = tour("The Sea Explorer", 497.0);
        b.apply_ratings(5, 4.6);
        let mut c = tour("The Snow Adventurer", 997.0);
        c.difficulty = Difficulty::Difficult;
        c.apply_ratings(2, 4.5);
        let mut low = tour("The Park Camper", 1497.0);
        low.apply_ratings(3, 3.9);

        let stats = tour_stats(&[a, b, c, low]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].difficulty, "EASY");
        assert_eq!(stats[0].num_tours, 2);
        assert_eq!(stats[0].num_ratings, 15);
        assert_eq!(stats[0].min_price, 397.0);
        assert_eq!(stats[0].max_price, 497.0);
        assert!((stats[0].avg_price - 447.0).abs() < 1e-9);
        assert_eq!(stats[1].difficulty, "DIFFICULT");
    }

    #[test]
    fn monthly_plan_counts_starts_in_year() {
        let mut a = tour("The Forest Hiker", 397.0);
        a.start_dates = vec![
            Utc.with_ymd_and_hms(2021, 4, 25, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 7, 20, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 7, 20, 10, 0, 0).unwrap(),
        ];
        let mut b = tour("The Sea Explorer", 497.0);
        b.start_dates = vec![Utc.with_ymd_and_hms(2021, 7, 1, 9, 0, 0).unwrap()];

        let plan = monthly_plan(&[a, b], 2021).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].month, 7);
        assert_eq!(plan[0].num_tour_starts, 2);
        assert_eq!(plan[0].tours, vec!["The Forest Hiker", "The Sea Explorer"]);
        assert_eq!(plan[1].month, 4);
    }

    #[test]
    fn monthly_plan_rejects_out_of_range_year() {
        assert!(monthly_plan(&[], 1999).is_err());
        assert!(monthly_plan(&[], 2101).is_err());
    }
}

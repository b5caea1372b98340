use serde::Serialize;

/// Average assumed before any review exists.
pub const DEFAULT_AVERAGE: f64 = 4.5;

/// Count and one-decimal mean of a tour's ratings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub quantity: u32,
    pub average: f64,
}

impl RatingSummary {
    /// Summarise `ratings`; an empty set resets to `{0, 4.5}`.
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (count, total) = ratings
            .into_iter()
            .fold((0u32, 0u64), |(n, sum), r| (n + 1, sum + u64::from(r)));
        if count == 0 {
            return Self::empty();
        }
        let mean = total as f64 / f64::from(count);
        Self {
            quantity: count,
            average: (mean * 10.0).round() / 10.0,
        }
    }

    pub fn empty() -> Self {
        Self {
            quantity: 0,
            average: DEFAULT_AVERAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_is_rounded_to_one_decimal() {
        let s = RatingSummary::from_ratings([5, 4, 4]);
        assert_eq!(s.quantity, 3);
        assert_eq!(s.average, 4.3);
    }

    #[test]
    fn no_ratings_resets_to_default() {
        let s = RatingSummary::from_ratings(Vec::<u8>::new());
        assert_eq!(s, RatingSummary { quantity: 0, average: 4.5 });
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the summary equals round(mean, 1) and stays within the rating scale.
            #[test]
            fn average_is_rounded_mean(ratings in proptest::collection::vec(1u8..=5, 1..50)) {
                let s = RatingSummary::from_ratings(ratings.iter().copied());
                let mean = ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64;
                prop_assert_eq!(s.quantity as usize, ratings.len());
                prop_assert!((s.average - (mean * 10.0).round() / 10.0).abs() < 1e-9);
                prop_assert!((1.0..=5.0).contains(&s.average));
            }
        }
    }
}

#![forbid(unsafe_code)]

//! Property-based invariant tests for the fixed-capacity ring buffer,
//! checked against a plain `Vec` model.
//!
//! ## Invariants
//!
//! 1. Length never exceeds capacity
//! 2. Contents equal the model's trailing `capacity` items, oldest first
//! 3. Push returns the evicted item exactly when the ring was full
//! 4. `latest` mirrors the model's last element
//! 5. `mean`/`max` agree with the retained window

use choreo_core::ring::FixedRing;
use proptest::prelude::*;

fn arb_pushes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1000.0f64..1000.0, 0..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn ring_matches_trailing_window_of_model(
        capacity in 1usize..40,
        pushes in arb_pushes(),
    ) {
        let mut ring = FixedRing::new(capacity);
        let mut model: Vec<f64> = Vec::new();

        for value in &pushes {
            let evicted = ring.push(*value);
            model.push(*value);

            if model.len() > capacity {
                prop_assert_eq!(evicted, Some(model[model.len() - capacity - 1]));
            } else {
                prop_assert_eq!(evicted, None);
            }

            prop_assert!(ring.len() <= capacity);
            prop_assert_eq!(ring.len(), model.len().min(capacity));

            let window_start = model.len().saturating_sub(capacity);
            let window = &model[window_start..];
            let contents: Vec<f64> = ring.iter().copied().collect();
            prop_assert_eq!(contents.as_slice(), window);
            prop_assert_eq!(ring.latest(), window.last());
        }
    }

    #[test]
    fn mean_and_max_track_the_retained_window(
        capacity in 1usize..40,
        // Durations and magnitudes are non-negative; `max` folds from 0.0.
        pushes in prop::collection::vec(0.0f64..1000.0, 0..200),
    ) {
        let mut ring = FixedRing::new(capacity);
        let mut model: Vec<f64> = Vec::new();
        for value in pushes {
            ring.push(value);
            model.push(value);
        }

        let window_start = model.len().saturating_sub(capacity);
        let window = &model[window_start..];

        if window.is_empty() {
            prop_assert_eq!(ring.mean(), 0.0);
            prop_assert_eq!(ring.max(), 0.0);
        } else {
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let max = window.iter().copied().fold(f64::MIN, f64::max);
            prop_assert!((ring.mean() - mean).abs() < 1e-9);
            prop_assert!((ring.max() - max).abs() < 1e-12);
        }
    }

    #[test]
    fn clear_empties_without_touching_capacity(
        capacity in 1usize..40,
        pushes in arb_pushes(),
    ) {
        let mut ring = FixedRing::new(capacity);
        for value in &pushes {
            ring.push(*value);
        }
        ring.clear();
        prop_assert!(ring.is_empty());
        prop_assert_eq!(ring.iter().count(), 0);

        // Still usable at full capacity after a clear.
        for i in 0..capacity {
            ring.push(i as f64);
        }
        prop_assert_eq!(ring.len(), capacity);
        prop_assert_eq!(ring.latest(), Some(&((capacity - 1) as f64)));
    }
}

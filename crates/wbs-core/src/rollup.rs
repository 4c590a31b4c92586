//! Schedule and progress aggregation for summary nodes.
//!
//! The calculator only looks at a node's *direct* children. Grandchildren are
//! accounted for because each child was itself rolled up before its parent.

use chrono::NaiveDate;

use crate::models::TaskNode;

/// Derived schedule for a summary node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rollup {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: f64,
    pub progress: i32,
}

impl Rollup {
    /// True when `node` already carries exactly these derived values.
    pub fn is_reflected_in(&self, node: &TaskNode) -> bool {
        node.start_date == Some(self.start_date)
            && node.end_date == Some(self.end_date)
            && node.duration_days == Some(self.duration_days)
            && node.progress == self.progress
    }
}

/// Calendar days from `start` to `end`, not counting the start day.
///
/// A task that starts and finishes on the same date lasts 0 days. Leaf
/// duration bookkeeping uses the same function.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64
}

// Weights are exact integers in hundredths of a day so the weighted sums do
// not depend on the order children are visited in.
const HUNDREDTHS_PER_DAY: i64 = 100;

fn weight(duration_days: Option<f64>) -> i128 {
    match duration_days {
        Some(d) if d > 0.0 => ((d * HUNDREDTHS_PER_DAY as f64).round() as i128).max(1),
        _ => HUNDREDTHS_PER_DAY as i128,
    }
}

fn round_half_up(numerator: i128, denominator: i128) -> i32 {
    if denominator <= 0 {
        return 0;
    }
    ((2 * numerator + denominator) / (2 * denominator)) as i32
}

/// Computes a parent's schedule from its children.
///
/// Children without both dates are skipped. Returns `None` when no child is
/// scheduled; callers must then leave the parent untouched.
pub fn rollup<'a, I>(children: I) -> Option<Rollup>
where
    I: IntoIterator<Item = &'a TaskNode>,
{
    let mut start: Option<NaiveDate> = None;
    let mut end: Option<NaiveDate> = None;
    let mut weighted_progress: i128 = 0;
    let mut total_weight: i128 = 0;

    for child in children {
        let (Some(child_start), Some(child_end)) = (child.start_date, child.end_date) else {
            continue;
        };
        start = Some(start.map_or(child_start, |s| s.min(child_start)));
        end = Some(end.map_or(child_end, |e| e.max(child_end)));

        let w = weight(child.duration_days);
        weighted_progress += i128::from(child.progress.clamp(0, 100)) * w;
        total_weight += w;
    }

    let (start, end) = (start?, end?);
    Some(Rollup {
        start_date: start,
        end_date: end,
        duration_days: days_between(start, end).max(0.0),
        progress: round_half_up(weighted_progress, total_weight),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn child(start: Option<NaiveDate>, end: Option<NaiveDate>, duration: Option<f64>, progress: i32) -> TaskNode {
        TaskNode {
            name: "child".to_string(),
            start_date: start,
            end_date: end,
            duration_days: duration,
            progress,
            ..Default::default()
        }
    }

    #[test]
    fn test_weighted_progress_example() {
        let children = vec![
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 5)), Some(4.0), 50),
            child(Some(date(2026, 1, 5)), Some(date(2026, 1, 6)), Some(1.0), 100),
        ];
        let r = rollup(&children).unwrap();
        assert_eq!(r.progress, 60);
        assert_eq!(r.start_date, date(2026, 1, 1));
        assert_eq!(r.end_date, date(2026, 1, 6));
        assert_eq!(r.duration_days, 5.0);
    }

    #[test]
    fn test_min_start_max_end() {
        let children = vec![
            child(Some(date(2026, 2, 10)), Some(date(2026, 2, 20)), Some(10.0), 0),
            child(Some(date(2026, 2, 3)), Some(date(2026, 2, 8)), Some(5.0), 0),
            child(Some(date(2026, 2, 15)), Some(date(2026, 3, 1)), Some(14.0), 0),
        ];
        let r = rollup(&children).unwrap();
        assert_eq!(r.start_date, date(2026, 2, 3));
        assert_eq!(r.end_date, date(2026, 3, 1));
        assert_eq!(r.duration_days, 26.0);
    }

    #[test]
    fn test_zero_duration_children_weigh_one() {
        // milestone (weight 1) at 100%, 3-day task at 0% -> 100 / 4
        let children = vec![
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 1)), Some(0.0), 100),
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 4)), Some(3.0), 0),
        ];
        assert_eq!(rollup(&children).unwrap().progress, 25);

        let children = vec![
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 1)), None, 40),
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 1)), None, 80),
        ];
        assert_eq!(rollup(&children).unwrap().progress, 60);
    }

    #[test]
    fn test_incomplete_children_are_ignored() {
        let children = vec![
            child(Some(date(2026, 1, 1)), None, Some(9.0), 100),
            child(None, Some(date(2026, 12, 31)), Some(9.0), 100),
            child(Some(date(2026, 1, 10)), Some(date(2026, 1, 12)), Some(2.0), 30),
        ];
        let r = rollup(&children).unwrap();
        assert_eq!(r.start_date, date(2026, 1, 10));
        assert_eq!(r.end_date, date(2026, 1, 12));
        assert_eq!(r.progress, 30);
    }

    #[test]
    fn test_all_unscheduled_is_noop() {
        let children = vec![child(None, None, None, 50), child(None, None, Some(3.0), 10)];
        assert_eq!(rollup(&children), None);
        assert_eq!(rollup(&Vec::<TaskNode>::new()), None);
    }

    #[rstest]
    #[case(50, 51, 51)] // 50.5 rounds up
    #[case(0, 1, 1)] // 0.5 rounds up
    #[case(10, 11, 11)]
    #[case(33, 33, 33)]
    fn test_round_half_up(#[case] a: i32, #[case] b: i32, #[case] expected: i32) {
        let children = vec![
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 2)), Some(1.0), a),
            child(Some(date(2026, 1, 1)), Some(date(2026, 1, 2)), Some(1.0), b),
        ];
        assert_eq!(rollup(&children).unwrap().progress, expected);
    }

    #[test]
    fn test_days_between_is_exclusive() {
        assert_eq!(days_between(date(2026, 1, 1), date(2026, 1, 1)), 0.0);
        assert_eq!(days_between(date(2026, 1, 1), date(2026, 1, 2)), 1.0);
        assert_eq!(days_between(date(2026, 2, 27), date(2026, 3, 1)), 2.0);
    }

    #[test]
    fn test_is_reflected_in() {
        let children = vec![child(Some(date(2026, 1, 1)), Some(date(2026, 1, 3)), Some(2.0), 70)];
        let r = rollup(&children).unwrap();
        let mut parent = TaskNode {
            start_date: Some(r.start_date),
            end_date: Some(r.end_date),
            duration_days: Some(r.duration_days),
            progress: r.progress,
            ..Default::default()
        };
        assert!(r.is_reflected_in(&parent));
        parent.progress = 0;
        assert!(!r.is_reflected_in(&parent));
    }

    fn arb_child() -> impl Strategy<Value = TaskNode> {
        (0i64..400, 0i64..60, prop::option::of(0.0f64..90.0), 0i32..=100, any::<bool>()).prop_map(
            |(offset, len, duration, progress, scheduled)| {
                let start = date(2026, 1, 1) + chrono::Duration::days(offset);
                let end = start + chrono::Duration::days(len);
                if scheduled {
                    child(Some(start), Some(end), duration, progress)
                } else {
                    child(None, None, duration, progress)
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_order_independent(mut children in prop::collection::vec(arb_child(), 0..12), seed in any::<u64>()) {
            let forward = rollup(&children);
            fastrand::seed(seed);
            fastrand::shuffle(&mut children);
            prop_assert_eq!(forward, rollup(&children));
            children.reverse();
            prop_assert_eq!(forward, rollup(&children));
        }

        #[test]
        fn prop_bounds_hold(children in prop::collection::vec(arb_child(), 1..12)) {
            if let Some(r) = rollup(&children) {
                prop_assert!((0..=100).contains(&r.progress));
                prop_assert!(r.duration_days >= 0.0);
                for c in children.iter().filter(|c| c.is_scheduled()) {
                    prop_assert!(r.start_date <= c.start_date.unwrap());
                    prop_assert!(r.end_date >= c.end_date.unwrap());
                }
            } else {
                prop_assert!(children.iter().all(|c| !c.is_scheduled()));
            }
        }
    }
}

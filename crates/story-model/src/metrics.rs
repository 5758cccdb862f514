//! Display statistics derived from a session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{parse_number, DateLike, SessionRecord};

/// Title used when the session has none.
pub const FALLBACK_TITLE: &str = "Treino";

/// Calorie heuristic: kcal burned per minute of session time.
///
/// Policy constant kept for output compatibility; not a validated model.
pub const KCAL_PER_MINUTE: f64 = 4.0;

/// Calorie heuristic: kcal per kilogram of lifted volume.
///
/// Policy constant kept for output compatibility; not a validated model.
pub const KCAL_PER_KG_VOLUME: f64 = 0.01;

/// Team count from which the team badge is drawn.
pub const TEAM_BADGE_MIN: u32 = 2;

/// The fixed statistics shown on a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub title: String,
    /// `DD/MM/YYYY`, or empty when the session has no usable date.
    pub date: String,
    /// Total lifted volume in kilograms.
    pub volume: f64,
    /// Session duration in seconds.
    pub total_time: f64,
    pub kcal: f64,
    pub team_count: u32,
}

impl Metrics {
    /// Extract metrics from a session. Never fails: malformed fields fall back
    /// to zero/empty defaults.
    pub fn from_session(session: &SessionRecord) -> Self {
        let volume = compute_volume(session.log_entries());
        let total_time = session.duration_secs().unwrap_or(0.0);
        let kcal = match session.kcal_estimate() {
            Some(estimate) => estimate.round(),
            None => estimate_kcal(total_time, volume),
        };

        let metrics = Self {
            title: session
                .title()
                .unwrap_or_else(|| FALLBACK_TITLE.to_string()),
            date: session
                .date()
                .and_then(DateLike::local_date)
                .map(format_date_br)
                .unwrap_or_default(),
            volume,
            total_time,
            kcal,
            team_count: session.team_count().unwrap_or(0),
        };

        tracing::debug!(
            volume = metrics.volume,
            total_time = metrics.total_time,
            kcal = metrics.kcal,
            team_count = metrics.team_count,
            "Extracted session metrics"
        );
        metrics
    }

    /// Apply a calorie estimate that arrived after extraction.
    ///
    /// A usable (positive, finite) estimate replaces the heuristic; anything
    /// else restores the heuristic value.
    pub fn with_kcal_estimate(&self, estimate: Option<f64>) -> Self {
        let kcal = estimate
            .filter(|k| k.is_finite() && *k > 0.0)
            .map(f64::round)
            .unwrap_or_else(|| estimate_kcal(self.total_time, self.volume));
        Self {
            kcal,
            ..self.clone()
        }
    }

    /// Whether the story carries the team badge.
    pub fn shows_team_badge(&self) -> bool {
        self.team_count >= TEAM_BADGE_MIN
    }

    /// `12.340 kg`
    pub fn volume_label(&self) -> String {
        format!("{} kg", group_thousands(self.volume.max(0.0).round() as u64))
    }

    /// `MM:SS`, or `H:MM:SS` from one hour up.
    pub fn time_label(&self) -> String {
        let total = self.total_time.max(0.0).round() as u64;
        let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
        if h > 0 {
            format!("{h}:{m:02}:{s:02}")
        } else {
            format!("{m:02}:{s:02}")
        }
    }

    pub fn kcal_label(&self) -> String {
        format!("{}", self.kcal.max(0.0).round() as u64)
    }
}

/// Sum of `weight × reps` over log entries where both parse to positive
/// finite numbers. Anything else contributes nothing.
pub fn compute_volume<'a>(entries: impl IntoIterator<Item = &'a Value>) -> f64 {
    entries
        .into_iter()
        .filter_map(|entry| {
            let weight = entry.get("weight").and_then(parse_number)?;
            let reps = entry.get("reps").and_then(parse_number)?;
            (weight > 0.0 && reps > 0.0).then_some(weight * reps)
        })
        .filter(|v| v.is_finite())
        .sum()
}

/// Heuristic calorie estimate, rounded. Zero when the duration is zero.
pub fn estimate_kcal(total_time_secs: f64, volume_kg: f64) -> f64 {
    if !(total_time_secs > 0.0) {
        return 0.0;
    }
    let minutes = total_time_secs / 60.0;
    (KCAL_PER_MINUTE * minutes + KCAL_PER_KG_VOLUME * volume_kg.max(0.0)).round()
}

/// `DD/MM/YYYY`
pub fn format_date_br(day: NaiveDate) -> String {
    day.format("%d/%m/%Y").to_string()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_volume_skips_zero_and_parses_comma() {
        let logs = json!({
            "0-0": {"weight": "10,5", "reps": "8"},
            "0-1": {"weight": 0, "reps": 5}
        });
        let entries: Vec<&Value> = logs.as_object().unwrap().values().collect();
        assert!((compute_volume(entries) - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_ignores_garbage() {
        let logs = [
            json!({"weight": "abc", "reps": 3}),
            json!({"weight": 20}),
            json!("not an entry"),
            json!({"weight": -5, "reps": 10}),
            json!({"weight": 20, "reps": 3}),
        ];
        assert_eq!(compute_volume(logs.iter()), 60.0);
    }

    #[test]
    fn test_kcal_fallback_scenario() {
        let session = SessionRecord::new(json!({
            "totalTime": 1200,
            "logs": {"a": {"weight": 100, "reps": 20}}
        }));
        let m = Metrics::from_session(&session);
        assert_eq!(m.volume, 2000.0);
        assert_eq!(m.kcal, 100.0);
    }

    #[test]
    fn test_kcal_zero_without_duration() {
        assert_eq!(estimate_kcal(0.0, 5000.0), 0.0);
    }

    #[test]
    fn test_external_kcal_is_rounded() {
        let session = SessionRecord::new(json!({"totalTime": 1200, "kcal": 312.6}));
        assert_eq!(Metrics::from_session(&session).kcal, 313.0);
    }

    #[test]
    fn test_late_estimate_replaces_heuristic() {
        let session = SessionRecord::new(json!({"totalTime": 600}));
        let m = Metrics::from_session(&session);
        assert_eq!(m.kcal, 40.0);
        assert_eq!(m.with_kcal_estimate(Some(250.4)).kcal, 250.0);
        assert_eq!(m.with_kcal_estimate(Some(-1.0)).kcal, 40.0);
    }

    #[test]
    fn test_malformed_session_still_yields_metrics() {
        let session = SessionRecord::new(json!({
            "title": 42,
            "date": {"weird": true},
            "logs": "nope",
            "totalTime": "soon",
            "teamCount": null
        }));
        let m = Metrics::from_session(&session);
        assert_eq!(m.title, FALLBACK_TITLE);
        assert_eq!(m.date, "");
        assert_eq!(m.volume, 0.0);
        assert_eq!(m.kcal, 0.0);
        assert_eq!(m.team_count, 0);
        assert!(!m.shows_team_badge());
    }

    #[test]
    fn test_date_formats_br() {
        let session = SessionRecord::new(json!({"date": "2024-03-05"}));
        assert_eq!(Metrics::from_session(&session).date, "05/03/2024");
    }

    #[test]
    fn test_labels() {
        let m = Metrics {
            title: "x".into(),
            date: String::new(),
            volume: 12_340.4,
            total_time: 3_725.0,
            kcal: 99.6,
            team_count: 3,
        };
        assert_eq!(m.volume_label(), "12.340 kg");
        assert_eq!(m.time_label(), "1:02:05");
        assert_eq!(m.kcal_label(), "100");
        assert!(m.shows_team_badge());

        let short = Metrics { total_time: 95.0, volume: 84.0, ..m };
        assert_eq!(short.time_label(), "01:35");
        assert_eq!(short.volume_label(), "84 kg");
    }

    fn log_entry() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0.0f64..500.0, 0u32..30).prop_map(|(w, r)| json!({"weight": w, "reps": r})),
            (-100.0f64..100.0, -10i32..10).prop_map(|(w, r)| json!({"weight": w.to_string(), "reps": r})),
            "[a-z]{0,4}".prop_map(|s| json!({"weight": s, "reps": 3})),
            Just(json!({})),
        ]
    }

    proptest! {
        #[test]
        fn prop_volume_non_negative_and_order_free(entries in prop::collection::vec(log_entry(), 0..40)) {
            let forward = compute_volume(entries.iter());
            let backward = compute_volume(entries.iter().rev());
            prop_assert!(forward >= 0.0);
            prop_assert!((forward - backward).abs() <= 1e-6 * forward.max(1.0));
        }
    }
}

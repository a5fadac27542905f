// src/services/analytics.rs

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    config::TREND_WINDOW,
    error::AppError,
    models::session::{QuizSession, SessionStatus},
    store::QuizStore,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub key: String,
    /// Questions the user actually answered; skipped ones are not counted.
    pub answered: usize,
    pub correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeStats {
    pub min_secs: i64,
    pub max_secs: i64,
    pub mean_secs: f64,
    pub mean_secs_per_question: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub sessions: usize,
    pub mean_score: Option<f64>,
    pub best_score: Option<i32>,
    /// Recent window mean minus previous window mean, in score points.
    pub trend: Option<f64>,
    /// Weakest first.
    pub categories: Vec<Breakdown>,
    pub difficulties: Vec<Breakdown>,
    pub time: Option<TimeStats>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64)
}

fn breakdowns(tallies: BTreeMap<String, (usize, usize)>) -> Vec<Breakdown> {
    let mut list: Vec<Breakdown> = tallies
        .into_iter()
        .map(|(key, (answered, correct))| Breakdown {
            accuracy: if answered == 0 {
                0.0
            } else {
                round1(correct as f64 * 100.0 / answered as f64)
            },
            key,
            answered,
            correct,
        })
        .collect();
    // BTreeMap order already makes ties deterministic; the sort is stable.
    list.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
    list
}

/// Aggregates completed sessions. Input order does not matter; sessions in
/// other states are ignored.
pub fn summarize(history: &[QuizSession]) -> AnalyticsReport {
    let mut completed: Vec<&QuizSession> = history
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();
    completed.sort_by_key(|s| (Reverse(s.ended_at.unwrap_or(s.started_at)), Reverse(s.id)));

    let scores: Vec<i32> = completed.iter().filter_map(|s| s.score).collect();

    let recent = &scores[..scores.len().min(TREND_WINDOW)];
    let previous = &scores[recent.len()..scores.len().min(2 * TREND_WINDOW)];
    let trend = match (mean(recent), mean(previous)) {
        (Some(r), Some(p)) => Some(round1(r - p)),
        _ => None,
    };

    let mut categories: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut difficulties: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for session in &completed {
        for (item, answer) in session.items.iter().zip(&session.answers) {
            if answer.is_none() {
                continue;
            }
            let hit = usize::from(item.is_correct(*answer));
            let c = categories.entry(item.category.clone()).or_default();
            c.0 += 1;
            c.1 += hit;
            let d = difficulties.entry(item.difficulty.as_str().to_string()).or_default();
            d.0 += 1;
            d.1 += hit;
        }
    }

    let elapsed: Vec<i64> = completed.iter().filter_map(|s| s.elapsed_secs).collect();
    let questions: usize = completed.iter().map(|s| s.total_questions()).sum();
    let time = match (elapsed.iter().min(), elapsed.iter().max()) {
        (Some(min), Some(max)) => {
            let total: i64 = elapsed.iter().sum();
            Some(TimeStats {
                min_secs: *min,
                max_secs: *max,
                mean_secs: round1(total as f64 / elapsed.len() as f64),
                mean_secs_per_question: if questions == 0 {
                    0.0
                } else {
                    round1(total as f64 / questions as f64)
                },
            })
        }
        _ => None,
    };

    AnalyticsReport {
        sessions: completed.len(),
        mean_score: mean(&scores).map(round1),
        best_score: scores.iter().max().copied(),
        trend,
        categories: breakdowns(categories),
        difficulties: breakdowns(difficulties),
        time,
    }
}

/// Loads the user's most recent completed sessions and aggregates them.
pub async fn report_for(
    store: &dyn QuizStore,
    user_id: i64,
    history_limit: usize,
) -> Result<AnalyticsReport, AppError> {
    let history = store
        .list_sessions(user_id, Some(SessionStatus::Completed), history_limit as i64)
        .await?;
    Ok(summarize(&history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        question::Difficulty,
        session::{QuizMode, SessionItem},
    };
    use chrono::{Duration, TimeZone, Utc};

    /// A completed session with the given score pattern: `hits[i]` says
    /// whether question i was answered correctly.
    fn session(id: i64, minutes_ago: i64, hits: &[bool], category: &str, secs: i64) -> QuizSession {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let start = base - Duration::minutes(minutes_ago);
        let items = hits
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let difficulty = if i == 0 { Difficulty::Easy } else { Difficulty::Hard };
                SessionItem::sample(i as i64, 0, 4, category, difficulty)
            })
            .collect();
        let mut s = QuizSession::new(1, QuizMode::Quick, items, None, start);
        s.id = id;
        for (i, hit) in hits.iter().enumerate() {
            s.submit_answer(i, if *hit { 0 } else { 1 }, start + Duration::seconds(secs)).unwrap();
        }
        s
    }

    #[test]
    fn empty_history_yields_empty_report() {
        let report = summarize(&[]);
        assert_eq!(report.sessions, 0);
        assert_eq!(report.mean_score, None);
        assert_eq!(report.trend, None);
        assert!(report.categories.is_empty());
        assert_eq!(report.time, None);
    }

    #[test]
    fn trend_compares_recent_five_with_previous_five() {
        // Newest five score 100, older five score 50.
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(session(i, i * 10, &[true, true], "cardio", 60));
        }
        for i in 5..10 {
            history.push(session(i, i * 10, &[true, false], "cardio", 60));
        }
        // Older than the two windows; ignored by the trend.
        history.push(session(10, 200, &[false, false], "cardio", 60));

        let report = summarize(&history);
        assert_eq!(report.sessions, 11);
        assert_eq!(report.trend, Some(50.0));
        assert_eq!(report.best_score, Some(100));
    }

    #[test]
    fn partial_previous_window_still_produces_trend() {
        let history = vec![
            session(1, 0, &[true, true], "renal", 30),
            session(2, 10, &[true, false], "renal", 30),
            session(3, 20, &[true, true], "renal", 30),
            session(4, 30, &[true, true], "renal", 30),
            session(5, 40, &[true, true], "renal", 30),
            session(6, 50, &[false, false], "renal", 30),
        ];
        let report = summarize(&history);
        assert_eq!(report.trend, Some(90.0));

        let short = summarize(&history[..3]);
        assert_eq!(short.trend, None);
    }

    #[test]
    fn breakdowns_list_weakest_first() {
        let history = vec![
            session(1, 0, &[true, true], "cardio", 40),
            session(2, 10, &[false, false], "renal", 80),
        ];
        let report = summarize(&history);
        assert_eq!(report.categories[0].key, "renal");
        assert_eq!(report.categories[0].accuracy, 0.0);
        assert_eq!(report.categories[1].key, "cardio");
        assert_eq!(report.categories[1].accuracy, 100.0);
        assert_eq!(report.difficulties.len(), 2);

        let time = report.time.unwrap();
        assert_eq!(time.min_secs, 40);
        assert_eq!(time.max_secs, 80);
        assert_eq!(time.mean_secs, 60.0);
        assert_eq!(time.mean_secs_per_question, 30.0);
    }

    #[test]
    fn ignores_active_and_abandoned_sessions() {
        let now = Utc::now();
        let items = vec![SessionItem::sample(1, 0, 2, "neuro", Difficulty::Medium)];
        let active = QuizSession::new(1, QuizMode::Quick, items.clone(), None, now);
        let mut abandoned = QuizSession::new(1, QuizMode::Quick, items, None, now);
        abandoned.abandon(now).unwrap();

        let report = summarize(&[active, abandoned, session(3, 0, &[true], "cardio", 10)]);
        assert_eq!(report.sessions, 1);
        assert_eq!(report.mean_score, Some(100.0));
    }

    #[test]
    fn unanswered_questions_do_not_count_against_accuracy() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let items = vec![
            SessionItem::sample(1, 0, 4, "cardio", Difficulty::Easy),
            SessionItem::sample(2, 0, 4, "renal", Difficulty::Hard),
            SessionItem::sample(3, 0, 4, "renal", Difficulty::Hard),
        ];
        let mut timed = QuizSession::new(1, QuizMode::Timed, items, Some(270), start);
        timed.submit_answer(0, 0, start + Duration::seconds(20)).unwrap();
        assert!(timed.expire_if_due(start + Duration::seconds(300)));
        assert_eq!(timed.status, SessionStatus::Completed);

        let report = summarize(&[timed]);
        assert_eq!(report.mean_score, Some(33.0));
        // Never attempted, so no accuracy entry to drag down.
        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].key, "cardio");
        assert_eq!(report.categories[0].answered, 1);
        assert_eq!(report.categories[0].accuracy, 100.0);
        assert_eq!(report.difficulties.len(), 1);
        assert_eq!(report.difficulties[0].key, "easy");
    }

    #[test]
    fn summarize_is_pure() {
        let history = vec![
            session(1, 0, &[true, false], "cardio", 40),
            session(2, 10, &[false, true], "renal", 80),
        ];
        assert_eq!(summarize(&history), summarize(&history));
    }
}

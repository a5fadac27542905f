// src/services/diagnostics.rs

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::MAX_RECOVERY_ATTEMPTS,
    models::diagnostics::{
        ErrorEvent, Health, HealthReport, RecordedError, RecoveryOutcome, RecoveryStep,
        ReportErrorRequest, Severity,
    },
};

const DEGRADED_UNRECOVERED: usize = 3;
const CRITICAL_UNRECOVERED: usize = 10;

/// Bounded log of one user's client-side errors. Oldest events fall off.
#[derive(Debug)]
pub struct ErrorLog {
    capacity: usize,
    events: VecDeque<ErrorEvent>,
    /// Last report or recovery attempt.
    touched_at: Option<DateTime<Utc>>,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
            touched_at: None,
        }
    }

    /// Nothing was reported or retried since `cutoff`.
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.touched_at.is_none_or(|at| at < cutoff)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn record(&mut self, report: ReportErrorRequest, now: DateTime<Utc>) -> &ErrorEvent {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.touched_at = Some(now);
        self.events.push_back(ErrorEvent {
            id: Uuid::new_v4(),
            occurred_at: now,
            category: report.category,
            severity: report.severity,
            message: report.message,
            context: report.context,
            recovered: false,
            recovery_attempts: 0,
        });
        &self.events[self.events.len() - 1]
    }

    /// Newest first.
    pub fn events(&self) -> Vec<ErrorEvent> {
        self.events.iter().rev().cloned().collect()
    }

    pub fn health(&self) -> Health {
        let open: Vec<&ErrorEvent> = self.events.iter().filter(|e| !e.recovered).collect();
        let worst = open.iter().map(|e| e.severity).max();

        if worst == Some(Severity::Critical) || open.len() >= CRITICAL_UNRECOVERED {
            Health::Critical
        } else if worst == Some(Severity::High) || open.len() >= DEGRADED_UNRECOVERED {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }

    pub fn report(&self) -> HealthReport {
        let mut by_category = BTreeMap::new();
        for event in &self.events {
            *by_category.entry(event.category).or_insert(0) += 1;
        }
        HealthReport {
            health: self.health(),
            total_events: self.events.len(),
            unrecovered: self.events.iter().filter(|e| !e.recovered).count(),
            by_category,
        }
    }

    /// Records the outcome of a recovery attempt and says what to do next.
    /// Returns `None` when the event is unknown (or already evicted).
    pub fn attempt_recovery(
        &mut self,
        id: Uuid,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> Option<RecoveryOutcome> {
        let event = self.events.iter_mut().find(|e| e.id == id)?;
        self.touched_at = Some(now);

        let next = if event.recovered {
            RecoveryStep::Resolved
        } else {
            event.recovery_attempts += 1;
            if succeeded {
                event.recovered = true;
                RecoveryStep::Resolved
            } else if event.recovery_attempts <= MAX_RECOVERY_ATTEMPTS {
                RecoveryStep::Retry(event.category.recovery_action())
            } else {
                RecoveryStep::Escalate
            }
        };

        Some(RecoveryOutcome {
            event: event.clone(),
            next,
        })
    }
}

/// Per-user error logs. Process memory only; never persisted.
pub struct DiagnosticsRegistry {
    capacity: usize,
    logs: RwLock<HashMap<i64, ErrorLog>>,
}

impl DiagnosticsRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record(&self, user_id: i64, report: ReportErrorRequest, now: DateTime<Utc>) -> RecordedError {
        let mut logs = self.logs.write().await;
        let log = logs
            .entry(user_id)
            .or_insert_with(|| ErrorLog::new(self.capacity));
        let (id, recommended_action) = {
            let event = log.record(report, now);
            tracing::warn!(
                user_id,
                error_id = %event.id,
                category = ?event.category,
                severity = ?event.severity,
                "Client error reported: {}",
                event.message
            );
            (event.id, event.category.recovery_action())
        };

        RecordedError {
            id,
            recommended_action,
            health: log.health(),
        }
    }

    pub async fn events(&self, user_id: i64) -> Vec<ErrorEvent> {
        self.logs
            .read()
            .await
            .get(&user_id)
            .map(ErrorLog::events)
            .unwrap_or_default()
    }

    pub async fn health(&self, user_id: i64) -> HealthReport {
        match self.logs.read().await.get(&user_id) {
            Some(log) => log.report(),
            None => ErrorLog::new(self.capacity).report(),
        }
    }

    pub async fn recover(
        &self,
        user_id: i64,
        event_id: Uuid,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> Option<RecoveryOutcome> {
        let outcome = self
            .logs
            .write()
            .await
            .get_mut(&user_id)?
            .attempt_recovery(event_id, succeeded, now)?;

        if outcome.next == RecoveryStep::Escalate {
            tracing::error!(user_id, error_id = %event_id, "Recovery attempts exhausted");
        }
        Some(outcome)
    }

    /// Drops the user's log. Returns how many events were discarded.
    pub async fn clear(&self, user_id: i64) -> usize {
        self.logs
            .write()
            .await
            .remove(&user_id)
            .map(|log| log.len())
            .unwrap_or(0)
    }

    /// Forgets users whose log is empty or saw no activity since `cutoff`.
    /// Returns how many logs were dropped.
    pub async fn prune_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut logs = self.logs.write().await;
        let before = logs.len();
        logs.retain(|_, log| !log.is_empty() && !log.is_idle_since(cutoff));
        let dropped = before - logs.len();
        if dropped > 0 {
            tracing::info!(dropped, remaining = logs.len(), "Idle error logs pruned");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diagnostics::{ErrorCategory, RecoveryAction};

    fn report(category: ErrorCategory, severity: Severity) -> ReportErrorRequest {
        ReportErrorRequest {
            category,
            severity,
            message: "failed to fetch".to_string(),
            context: None,
        }
    }

    #[test]
    fn oldest_events_are_evicted_at_capacity() {
        let mut log = ErrorLog::new(3);
        let now = Utc::now();
        let first = log.record(report(ErrorCategory::Network, Severity::Low), now).id;
        for _ in 0..3 {
            log.record(report(ErrorCategory::Network, Severity::Low), now);
        }
        assert_eq!(log.len(), 3);
        assert!(log.events().iter().all(|e| e.id != first));
    }

    #[test]
    fn health_follows_thresholds() {
        let now = Utc::now();
        let mut log = ErrorLog::new(50);
        assert_eq!(log.health(), Health::Healthy);

        log.record(report(ErrorCategory::Render, Severity::Low), now);
        log.record(report(ErrorCategory::Render, Severity::Low), now);
        assert_eq!(log.health(), Health::Healthy);

        log.record(report(ErrorCategory::Render, Severity::Low), now);
        assert_eq!(log.health(), Health::Degraded);

        for _ in 0..7 {
            log.record(report(ErrorCategory::Render, Severity::Low), now);
        }
        assert_eq!(log.health(), Health::Critical);

        let mut single = ErrorLog::new(50);
        single.record(report(ErrorCategory::Data, Severity::High), now);
        assert_eq!(single.health(), Health::Degraded);
        single.record(report(ErrorCategory::Auth, Severity::Critical), now);
        assert_eq!(single.health(), Health::Critical);
    }

    #[test]
    fn recovered_events_stop_counting() {
        let now = Utc::now();
        let mut log = ErrorLog::new(50);
        let id = log.record(report(ErrorCategory::Auth, Severity::Critical), now).id;
        assert_eq!(log.health(), Health::Critical);

        let outcome = log.attempt_recovery(id, true, now).unwrap();
        assert_eq!(outcome.next, RecoveryStep::Resolved);
        assert!(outcome.event.recovered);
        assert_eq!(log.health(), Health::Healthy);
    }

    #[test]
    fn failed_recovery_is_retried_once_then_escalated() {
        let now = Utc::now();
        let mut log = ErrorLog::new(50);
        let id = log.record(report(ErrorCategory::Network, Severity::Medium), now).id;

        let first = log.attempt_recovery(id, false, now).unwrap();
        assert_eq!(first.next, RecoveryStep::Retry(RecoveryAction::Retry));
        assert_eq!(first.event.recovery_attempts, MAX_RECOVERY_ATTEMPTS);

        let second = log.attempt_recovery(id, false, now).unwrap();
        assert_eq!(second.next, RecoveryStep::Escalate);
        assert!(!second.event.recovered);

        assert!(log.attempt_recovery(Uuid::new_v4(), true, now).is_none());
    }

    #[test]
    fn categories_map_to_recovery_actions() {
        assert_eq!(ErrorCategory::Network.recovery_action(), RecoveryAction::Retry);
        assert_eq!(ErrorCategory::Auth.recovery_action(), RecoveryAction::Reauthenticate);
        assert_eq!(ErrorCategory::Data.recovery_action(), RecoveryAction::ResetLocalState);
        assert_eq!(ErrorCategory::Unknown.recovery_action(), RecoveryAction::None);
    }

    #[tokio::test]
    async fn registry_keeps_logs_per_user() {
        let registry = DiagnosticsRegistry::new(10);
        let now = Utc::now();
        registry
            .record(1, report(ErrorCategory::Data, Severity::High), now)
            .await;
        assert_eq!(registry.events(1).await.len(), 1);
        assert!(registry.events(2).await.is_empty());
        assert_eq!(registry.health(1).await.health, Health::Degraded);
        assert_eq!(registry.clear(1).await, 1);
        assert_eq!(registry.health(1).await.health, Health::Healthy);
    }

    #[tokio::test]
    async fn idle_logs_are_pruned() {
        let registry = DiagnosticsRegistry::new(10);
        let now = Utc::now();
        let old = now - chrono::Duration::hours(3);
        let stale = registry
            .record(1, report(ErrorCategory::Render, Severity::Low), old)
            .await;
        registry
            .record(2, report(ErrorCategory::Render, Severity::Low), now)
            .await;

        let cutoff = now - chrono::Duration::hours(2);
        assert_eq!(registry.prune_idle(cutoff).await, 1);
        assert!(registry.events(1).await.is_empty());
        assert_eq!(registry.events(2).await.len(), 1);
        assert!(registry.recover(1, stale.id, true, now).await.is_none());

        // A recovery attempt counts as activity.
        let kept = registry
            .record(3, report(ErrorCategory::Data, Severity::Low), old)
            .await;
        assert!(registry.recover(3, kept.id, false, now).await.is_some());
        assert_eq!(registry.prune_idle(cutoff).await, 0);
    }
}

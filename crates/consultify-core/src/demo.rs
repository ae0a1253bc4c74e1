//! In-memory demo sessions and the onboarding tour they walk through.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourStep {
    Welcome,
    Assessment,
    Initiatives,
    Roadmap,
    AiChat,
    Report,
    Done,
}

impl TourStep {
    pub const ORDER: [TourStep; 7] = [
        TourStep::Welcome,
        TourStep::Assessment,
        TourStep::Initiatives,
        TourStep::Roadmap,
        TourStep::AiChat,
        TourStep::Report,
        TourStep::Done,
    ];

    /// The following step; `Done` is terminal.
    pub fn next(self) -> TourStep {
        let idx = Self::ORDER.iter().position(|s| *s == self).unwrap_or(0);
        Self::ORDER.get(idx + 1).copied().unwrap_or(TourStep::Done)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TourProgress {
    pub step: TourStep,
    pub completed: Vec<TourStep>,
}

impl Default for TourProgress {
    fn default() -> Self {
        Self {
            step: TourStep::Welcome,
            completed: Vec::new(),
        }
    }
}

impl TourProgress {
    pub fn advance(&mut self) {
        if self.step == TourStep::Done {
            return;
        }
        self.completed.push(self.step);
        self.step = self.step.next();
    }

    pub fn is_finished(&self) -> bool {
        self.step == TourStep::Done
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoSession {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tour: TourProgress,
}

impl DemoSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Mutex-guarded session map with a fixed time-to-live.
#[derive(Debug)]
pub struct DemoSessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, DemoSession>>,
}

impl DemoSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DemoSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn start(&self, organization_id: &str, user_id: &str, now: DateTime<Utc>) -> DemoSession {
        let session = DemoSession {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            tour: TourProgress::default(),
        };
        self.lock().insert(session.id.clone(), session.clone());
        session
    }

    /// `None` when unknown or expired.
    pub fn get(&self, id: &str, now: DateTime<Utc>) -> Option<DemoSession> {
        self.lock().get(id).filter(|s| !s.is_expired(now)).cloned()
    }

    /// Push expiry out to `now + ttl`.
    pub fn touch(&self, id: &str, now: DateTime<Utc>) -> Option<DemoSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(id).filter(|s| !s.is_expired(now))?;
        session.expires_at = now + self.ttl;
        Some(session.clone())
    }

    /// Complete the current tour step. Also refreshes expiry.
    pub fn advance_tour(&self, id: &str, now: DateTime<Utc>) -> Option<DemoSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(id).filter(|s| !s.is_expired(now))?;
        session.tour.advance();
        session.expires_at = now + self.ttl;
        Some(session.clone())
    }

    /// Remove expired sessions, returning how many were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(
                event = "demo_sweep",
                removed,
                remaining = sessions.len(),
                "expired demo sessions removed"
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

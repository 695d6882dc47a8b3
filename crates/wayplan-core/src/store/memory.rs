//! In-process [`PlanStore`] used by tests and local demos.
//!
//! All state sits behind one mutex, so `commit_generation` is atomic in the
//! same sense as the PostgreSQL transaction. Writes can be made to fail on
//! demand to exercise rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use wayplan_db::models::{
    BudgetLevel, FixedPoint, Plan, PlanStatus, TravelPace, UserPreferences,
};

use super::{CommitOutcome, PlanStore};

#[derive(Default)]
struct State {
    plans: HashMap<Uuid, Plan>,
    fixed_points: HashMap<Uuid, Vec<FixedPoint>>,
    quotas: HashMap<Uuid, i32>,
    preferences: HashMap<Uuid, UserPreferences>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave State half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Register a user with a generation allowance and return its id.
    pub fn add_user(&self, generations: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().quotas.insert(id, generations);
        id
    }

    pub fn quota(&self, user_id: Uuid) -> Option<i32> {
        self.lock().quotas.get(&user_id).copied()
    }

    pub fn set_quota(&self, user_id: Uuid, generations: i32) {
        self.lock().quotas.insert(user_id, generations);
    }

    /// Create a draft plan owned by `user_id`.
    pub fn add_plan(
        &self,
        user_id: Uuid,
        destination: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        notes: Option<&str>,
    ) -> Plan {
        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            user_id,
            name: destination.to_owned(),
            destination: destination.to_owned(),
            start_date,
            end_date,
            notes: notes.map(str::to_owned),
            status: PlanStatus::Draft,
            generated_content: None,
            created_at: now,
            updated_at: now,
            generated_at: None,
        };
        self.put_plan(plan.clone());
        plan
    }

    /// Insert or replace a plan row as-is.
    pub fn put_plan(&self, plan: Plan) {
        self.lock().plans.insert(plan.id, plan);
    }

    pub fn plan(&self, plan_id: Uuid) -> Option<Plan> {
        self.lock().plans.get(&plan_id).cloned()
    }

    pub fn remove_plan(&self, plan_id: Uuid) {
        let mut state = self.lock();
        state.plans.remove(&plan_id);
        state.fixed_points.remove(&plan_id);
    }

    pub fn set_status(&self, plan_id: Uuid, status: PlanStatus) {
        if let Some(plan) = self.lock().plans.get_mut(&plan_id) {
            plan.status = status;
        }
    }

    pub fn add_fixed_point(
        &self,
        plan_id: Uuid,
        location: &str,
        event_at: DateTime<Utc>,
        event_duration: Option<i32>,
        description: Option<&str>,
    ) -> FixedPoint {
        let point = FixedPoint {
            id: Uuid::new_v4(),
            plan_id,
            location: location.to_owned(),
            event_at,
            event_duration,
            description: description.map(str::to_owned),
            created_at: Utc::now(),
        };
        self.lock()
            .fixed_points
            .entry(plan_id)
            .or_default()
            .push(point.clone());
        point
    }

    pub fn set_preferences(
        &self,
        user_id: Uuid,
        travel_pace: TravelPace,
        interests: &[&str],
        budget_level: BudgetLevel,
    ) {
        let prefs = UserPreferences {
            user_id,
            travel_pace,
            interests: interests.iter().map(|s| (*s).to_owned()).collect(),
            budget_level,
            updated_at: Utc::now(),
        };
        self.lock().preferences.insert(user_id, prefs);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn load_plan(&self, plan_id: Uuid) -> Result<Option<Plan>> {
        Ok(self.plan(plan_id))
    }

    async fn load_fixed_points(&self, plan_id: Uuid) -> Result<Vec<FixedPoint>> {
        let mut points = self
            .lock()
            .fixed_points
            .get(&plan_id)
            .cloned()
            .unwrap_or_default();
        points.sort_by_key(|p| (p.event_at, p.created_at));
        Ok(points)
    }

    async fn load_preferences(&self, user_id: Uuid) -> Result<Option<UserPreferences>> {
        Ok(self.lock().preferences.get(&user_id).cloned())
    }

    async fn remaining_generations(&self, user_id: Uuid) -> Result<Option<i32>> {
        Ok(self.quota(user_id))
    }

    async fn commit_generation(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        content: &Value,
    ) -> Result<CommitOutcome> {
        self.check_writable()?;
        let mut state = self.lock();

        let remaining = match state.quotas.get(&user_id) {
            Some(&n) if n > 0 => n - 1,
            _ => return Ok(CommitOutcome::QuotaExhausted),
        };

        let Some(plan) = state
            .plans
            .get_mut(&plan_id)
            .filter(|p| p.status.is_editable())
        else {
            return Ok(CommitOutcome::PlanUnavailable);
        };
        let now = Utc::now();
        plan.generated_content = Some(content.clone());
        plan.status = PlanStatus::Generated;
        plan.generated_at = Some(now);
        plan.updated_at = now;

        state.quotas.insert(user_id, remaining);
        Ok(CommitOutcome::Committed { remaining })
    }

    async fn save_plan_content(
        &self,
        plan_id: Uuid,
        content: &Value,
        expected_status: PlanStatus,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut state = self.lock();
        match state.plans.get_mut(&plan_id) {
            Some(plan) if plan.status == expected_status => {
                plan.generated_content = Some(content.clone());
                plan.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

//! In-memory store for tests and local tooling.
//!
//! One mutex guards all state, so every method is trivially atomic. Failures
//! can be injected per achievement or for the whole store to exercise the
//! engine's error isolation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::ProgressionStore;
use crate::error::{Error, Result};
use crate::model::{
    AchievementDefinition, AchievementId, IncrementOutcome, LeaderboardScope, Metric, Period,
    ProgressRecord, Scope, StreakChange, TeamId, UserId, UserProgressionState,
};

#[derive(Default)]
struct Inner {
    achievements: HashMap<AchievementId, AchievementDefinition>,
    progress: HashMap<(UserId, AchievementId), ProgressRecord>,
    users: HashMap<UserId, UserProgressionState>,
    teams: HashMap<TeamId, BTreeSet<UserId>>,
    failing: HashSet<AchievementId>,
    failing_user_state: bool,
    unavailable: bool,
}

impl Inner {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(injected("store marked unavailable"));
        }
        Ok(())
    }

    fn check_achievement(&self, id: AchievementId) -> Result<()> {
        self.check_available()?;
        if self.failing.contains(&id) {
            return Err(injected(&format!("failure injected for achievement {id}")));
        }
        Ok(())
    }

    fn credit(&mut self, user: UserId, amount: i64) -> (UserProgressionState, i32) {
        let state = self
            .users
            .entry(user)
            .or_insert_with(|| UserProgressionState::new(user));
        let previous_level = state.level;
        state.credit(amount);
        (state.clone(), previous_level)
    }

    fn in_scope(&self, user: UserId, scope: LeaderboardScope) -> bool {
        match scope {
            LeaderboardScope::Global => true,
            LeaderboardScope::Team(team) => self
                .teams
                .get(&team)
                .is_some_and(|members| members.contains(&user)),
        }
    }

    fn population(&self, metric: Metric, scope: LeaderboardScope) -> Vec<(UserId, i64)> {
        self.users
            .values()
            .filter(|state| self.in_scope(state.user_id, scope))
            .map(|state| (state.user_id, state.metric(metric)))
            .collect()
    }

    fn team_totals(&self, metric: Metric) -> Vec<(TeamId, i64)> {
        self.teams
            .iter()
            .map(|(team, members)| {
                let total = members
                    .iter()
                    .filter_map(|user| self.users.get(user))
                    .map(|state| state.metric(metric))
                    .sum();
                (*team, total)
            })
            .collect()
    }
}

fn injected(message: &str) -> Error {
    Error::StoreUnavailable(sqlx::Error::Protocol(message.to_string()))
}

/// Sort descending by value, ties by ascending id.
fn rank_order<K: Ord + Copy>(rows: &mut [(K, i64)]) {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
}

/// Volatile [`ProgressionStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every ledger operation on `achievement` fail as if the store
    /// were unreachable.
    pub fn fail_achievement(&self, achievement: AchievementId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing.insert(achievement);
        }
    }

    /// Make user-state reads fail while every other operation succeeds.
    pub fn fail_user_state(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_user_state = failing;
        }
    }

    /// Toggle a store-wide outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ProgressionStore for MemoryStore {
    async fn active_achievements(&self, scope: Scope) -> Result<Vec<AchievementDefinition>> {
        let inner = self.lock()?;
        inner.check_available()?;

        let mut found: Vec<_> = inner
            .achievements
            .values()
            .filter(|def| def.is_active && def.scope == scope)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn achievement(&self, id: AchievementId) -> Result<Option<AchievementDefinition>> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner.achievements.get(&id).cloned())
    }

    async fn upsert_achievement(&self, definition: &AchievementDefinition) -> Result<()> {
        definition.validate()?;
        let mut inner = self.lock()?;
        inner.check_available()?;
        inner.achievements.insert(definition.id, definition.clone());
        Ok(())
    }

    async fn progress(
        &self,
        user: UserId,
        achievement: AchievementId,
    ) -> Result<Option<ProgressRecord>> {
        let inner = self.lock()?;
        inner.check_achievement(achievement)?;
        Ok(inner.progress.get(&(user, achievement)).cloned())
    }

    async fn user_progress(&self, user: UserId) -> Result<Vec<ProgressRecord>> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner
            .progress
            .values()
            .filter(|record| record.user_id == user)
            .cloned()
            .collect())
    }

    async fn get_or_create_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
    ) -> Result<ProgressRecord> {
        let mut inner = self.lock()?;
        inner.check_achievement(achievement)?;
        Ok(inner
            .progress
            .entry((user, achievement))
            .or_insert_with(|| ProgressRecord::new(user, achievement, progress_max))
            .clone())
    }

    async fn increment_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        delta: i64,
        reward: i64,
    ) -> Result<IncrementOutcome> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        inner.check_achievement(achievement)?;

        let record = inner
            .progress
            .entry((user, achievement))
            .or_insert_with(|| ProgressRecord::new(user, achievement, progress_max));

        if record.is_earned() {
            return Err(Error::AlreadyEarned { user, achievement });
        }

        record.progress = record.progress.saturating_add(delta).min(record.progress_max);
        let just_completed = record.progress >= record.progress_max;
        if just_completed {
            record.earned_at = Some(Utc::now());
            record.xp_awarded = reward;
        }
        let record = record.clone();

        if just_completed {
            inner.credit(user, reward);
        }

        Ok(IncrementOutcome {
            record,
            just_completed,
        })
    }

    async fn award_if_unearned(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        reward: i64,
    ) -> Result<bool> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        inner.check_achievement(achievement)?;

        let record = inner
            .progress
            .entry((user, achievement))
            .or_insert_with(|| ProgressRecord::new(user, achievement, progress_max));

        if record.is_earned() {
            return Ok(false);
        }

        record.progress = record.progress_max;
        record.earned_at = Some(Utc::now());
        record.xp_awarded = reward;

        inner.credit(user, reward);
        Ok(true)
    }

    async fn credit_xp(&self, user: UserId, amount: i64) -> Result<(UserProgressionState, i32)> {
        let mut inner = self.lock()?;
        inner.check_available()?;
        Ok(inner.credit(user, amount))
    }

    async fn user_state(&self, user: UserId) -> Result<UserProgressionState> {
        let inner = self.lock()?;
        inner.check_available()?;
        if inner.failing_user_state {
            return Err(injected("failure injected for user state"));
        }
        Ok(inner
            .users
            .get(&user)
            .cloned()
            .unwrap_or_else(|| UserProgressionState::new(user)))
    }

    async fn touch_activity(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<(UserProgressionState, StreakChange)> {
        let mut inner = self.lock()?;
        inner.check_available()?;
        let state = inner
            .users
            .entry(user)
            .or_insert_with(|| UserProgressionState::new(user));
        let change = state.touch(today);
        Ok((state.clone(), change))
    }

    async fn reset_period_counters(&self, period: Period) -> Result<u64> {
        let mut inner = self.lock()?;
        inner.check_available()?;

        let mut changed = 0;
        for state in inner.users.values_mut() {
            let counter = match period {
                Period::Weekly => &mut state.weekly_xp,
                Period::Monthly => &mut state.monthly_xp,
            };
            if *counter != 0 {
                *counter = 0;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn add_team_member(&self, team: TeamId, user: UserId) -> Result<()> {
        let mut inner = self.lock()?;
        inner.check_available()?;
        inner.teams.entry(team).or_default().insert(user);
        Ok(())
    }

    async fn top_n_by_metric(
        &self,
        metric: Metric,
        n: u64,
        scope: LeaderboardScope,
    ) -> Result<Vec<(UserId, i64)>> {
        let inner = self.lock()?;
        inner.check_available()?;

        let mut rows = inner.population(metric, scope);
        rank_order(&mut rows);
        rows.truncate(usize::try_from(n).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn rank_count_above(
        &self,
        metric: Metric,
        value: i64,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner
            .population(metric, scope)
            .iter()
            .filter(|(_, v)| *v > value)
            .count() as u64)
    }

    async fn count_ahead(
        &self,
        metric: Metric,
        value: i64,
        user: UserId,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner
            .population(metric, scope)
            .iter()
            .filter(|(id, v)| *v > value || (*v == value && *id < user))
            .count() as u64)
    }

    async fn team_metric(&self, team: TeamId, metric: Metric) -> Result<i64> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner
            .team_totals(metric)
            .into_iter()
            .find(|(id, _)| *id == team)
            .map_or(0, |(_, total)| total))
    }

    async fn top_n_teams(&self, metric: Metric, n: u64) -> Result<Vec<(TeamId, i64)>> {
        let inner = self.lock()?;
        inner.check_available()?;

        let mut rows = inner.team_totals(metric);
        rank_order(&mut rows);
        rows.truncate(usize::try_from(n).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn team_rank_count_above(&self, metric: Metric, value: i64) -> Result<u64> {
        let inner = self.lock()?;
        inner.check_available()?;
        Ok(inner
            .team_totals(metric)
            .iter()
            .filter(|(_, total)| *total > value)
            .count() as u64)
    }
}

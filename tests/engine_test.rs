//! Integration tests for trigger evaluation, the progress ledger, and XP.

use ascent_rs::engine::{ProgressionEngine, require_user};
use ascent_rs::error::Error;
use ascent_rs::event::{EventContext, EventKind};
use ascent_rs::model::*;
use ascent_rs::store::{MemoryStore, ProgressionStore};

fn test_engine() -> ProgressionEngine<MemoryStore> {
    ProgressionEngine::in_memory()
}

async fn define(
    engine: &ProgressionEngine<MemoryStore>,
    definition: AchievementDefinition,
) -> AchievementDefinition {
    engine
        .store()
        .upsert_achievement(&definition)
        .await
        .expect("failed to store definition");
    definition
}

fn tasks_counter(max: i64, xp: i64) -> AchievementDefinition {
    AchievementDefinition::new(
        "Getting Things Done",
        Trigger::CountBased {
            category: "tasks".to_string(),
        },
    )
    .progress_max(max)
    .xp_reward(xp)
}

async fn task_done(engine: &ProgressionEngine<MemoryStore>, user: UserId) -> Vec<AchievementId> {
    engine
        .evaluate_trigger(user, &EventKind::TaskComplete, &EventContext::global())
        .await
        .unwrap()
        .awarded
        .iter()
        .map(|def| def.id)
        .collect()
}

// ---------------------------------------------------------------------------
// Counting achievements
// ---------------------------------------------------------------------------

#[tokio::test]
async fn count_achievement_awards_on_fifth_event() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(&engine, tasks_counter(5, 50)).await;

    for _ in 0..4 {
        assert!(task_done(&engine, user).await.is_empty());
    }
    let record = engine.store().progress(user, def.id).await.unwrap().unwrap();
    assert_eq!(record.progress, 4);
    assert_eq!(record.progress_max, 5);
    assert!(record.earned_at.is_none());

    assert_eq!(task_done(&engine, user).await, vec![def.id]);

    let state = engine.user_state(user).await.unwrap();
    assert_eq!(state.total_xp, 50);
    assert_eq!(state.weekly_xp, 50);
    assert_eq!(state.monthly_xp, 50);

    let record = engine.store().progress(user, def.id).await.unwrap().unwrap();
    assert_eq!(record.progress, 5);
    assert!(record.earned_at.is_some());
    assert_eq!(record.xp_awarded, 50);
}

#[tokio::test]
async fn earned_achievement_is_not_re_awarded() {
    let engine = test_engine();
    let user = UserId::new();
    define(&engine, tasks_counter(1, 10)).await;

    assert_eq!(task_done(&engine, user).await.len(), 1);
    for _ in 0..3 {
        assert!(task_done(&engine, user).await.is_empty());
    }
    assert_eq!(engine.user_state(user).await.unwrap().total_xp, 10);
}

#[tokio::test]
async fn zero_progress_max_completes_on_first_event() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(&engine, tasks_counter(0, 5)).await;

    assert_eq!(task_done(&engine, user).await, vec![def.id]);
    let record = engine.store().progress(user, def.id).await.unwrap().unwrap();
    assert_eq!(record.progress_max, 1);
}

#[tokio::test]
async fn exact_and_count_triggers_fire_from_one_action() {
    let engine = test_engine();
    let user = UserId::new();
    let first = define(
        &engine,
        AchievementDefinition::new("First Steps", Trigger::TaskComplete)
            .xp_reward(10)
            .order_index(1),
    )
    .await;
    let counter = define(&engine, tasks_counter(3, 20).order_index(2)).await;

    assert_eq!(task_done(&engine, user).await, vec![first.id]);
    let record = engine
        .store()
        .progress(user, counter.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.progress, 1);

    assert!(task_done(&engine, user).await.is_empty());
    assert_eq!(task_done(&engine, user).await, vec![counter.id]);
    assert_eq!(engine.user_state(user).await.unwrap().total_xp, 30);
}

#[tokio::test]
async fn generic_count_event_does_not_match_exact_trigger() {
    let engine = test_engine();
    let user = UserId::new();
    define(
        &engine,
        AchievementDefinition::new("First Steps", Trigger::TaskComplete).xp_reward(10),
    )
    .await;
    let counter = define(&engine, tasks_counter(2, 20)).await;

    let evaluation = engine
        .evaluate_trigger(
            user,
            &EventKind::Count("tasks".to_string()),
            &EventContext::global(),
        )
        .await
        .unwrap();
    assert!(evaluation.awarded.is_empty());

    let views = engine.get_achievements(user, Scope::Global).await.unwrap();
    let first = views
        .iter()
        .find(|v| v.achievement.trigger == Trigger::TaskComplete)
        .unwrap();
    assert_eq!(first.status, ProgressStatus::NotStarted);
    let counted = views.iter().find(|v| v.achievement.id == counter.id).unwrap();
    assert_eq!(counted.progress, 1);
    assert_eq!(counted.status, ProgressStatus::InProgress);
}

#[tokio::test]
async fn inactive_achievements_are_ignored() {
    let engine = test_engine();
    let user = UserId::new();
    define(&engine, tasks_counter(1, 10).inactive()).await;

    assert!(task_done(&engine, user).await.is_empty());
    assert_eq!(engine.user_state(user).await.unwrap().total_xp, 0);
}

#[tokio::test]
async fn empty_catalog_is_a_no_op() {
    let engine = test_engine();
    let evaluation = engine
        .evaluate_trigger(UserId::new(), &EventKind::TaskComplete, &EventContext::global())
        .await
        .unwrap();
    assert!(evaluation.awarded.is_empty());
    assert!(evaluation.is_clean());
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn team_achievement_requires_matching_team_context() {
    let engine = test_engine();
    let user = UserId::new();
    let team = TeamId::new();
    let def = define(
        &engine,
        AchievementDefinition::new("Team Player", Trigger::TaskComplete)
            .scope(Scope::Team(team))
            .xp_reward(15),
    )
    .await;

    assert!(task_done(&engine, user).await.is_empty());

    let other_team = EventContext::global().team(TeamId::new());
    let evaluation = engine
        .evaluate_trigger(user, &EventKind::TaskComplete, &other_team)
        .await
        .unwrap();
    assert!(evaluation.awarded.is_empty());

    let own_team = EventContext::global().team(team);
    let evaluation = engine
        .evaluate_trigger(user, &EventKind::TaskComplete, &own_team)
        .await
        .unwrap();
    assert_eq!(evaluation.awarded[0].id, def.id);
}

#[tokio::test]
async fn project_and_global_achievements_evaluate_together() {
    let engine = test_engine();
    let user = UserId::new();
    let project = ProjectId::new();
    let global = define(
        &engine,
        AchievementDefinition::new("Shipper", Trigger::ProjectComplete).xp_reward(100),
    )
    .await;
    let scoped = define(
        &engine,
        AchievementDefinition::new("Launch Day", Trigger::ProjectComplete)
            .scope(Scope::Project(project))
            .xp_reward(25),
    )
    .await;

    let evaluation = engine
        .evaluate_trigger(
            user,
            &EventKind::ProjectComplete,
            &EventContext::global().project(project),
        )
        .await
        .unwrap();

    let awarded: Vec<_> = evaluation.awarded.iter().map(|d| d.id).collect();
    assert_eq!(awarded, vec![global.id, scoped.id]);
    assert_eq!(evaluation.xp_awarded(), 125);
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn xp_threshold_fires_when_credit_crosses_it() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(
        &engine,
        AchievementDefinition::new("Thousand Club", Trigger::XpThreshold { xp: 1000 })
            .xp_reward(100),
    )
    .await;

    let credit = engine
        .credit_xp(user, 950, &EventContext::global())
        .await
        .unwrap();
    assert!(credit.evaluation.awarded.is_empty());

    let credit = engine
        .credit_xp(user, 100, &EventContext::global())
        .await
        .unwrap();
    assert_eq!(credit.state.total_xp, 1050);
    assert_eq!(credit.evaluation.awarded[0].id, def.id);

    assert_eq!(engine.user_state(user).await.unwrap().total_xp, 1150);

    let evaluation = engine
        .evaluate_trigger(user, &EventKind::XpCredited, &EventContext::global())
        .await
        .unwrap();
    assert!(evaluation.awarded.is_empty());

    let credit = engine
        .credit_xp(user, 10, &EventContext::global())
        .await
        .unwrap();
    assert!(credit.evaluation.awarded.is_empty());
    assert_eq!(credit.state.total_xp, 1160);
    assert_eq!(engine.user_state(user).await.unwrap().total_xp, 1160);
}

#[tokio::test]
async fn level_threshold_fires_at_level() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(
        &engine,
        AchievementDefinition::new("Level Two", Trigger::LevelThreshold { level: 2 })
            .xp_reward(5),
    )
    .await;

    let credit = engine
        .credit_xp(user, xp_for_level(2) - 1, &EventContext::global())
        .await
        .unwrap();
    assert_eq!(credit.state.level, 1);
    assert!(credit.evaluation.awarded.is_empty());

    let credit = engine.credit_xp(user, 1, &EventContext::global()).await.unwrap();
    assert_eq!(credit.state.level, 2);
    assert!(credit.leveled_up);
    assert_eq!(credit.evaluation.awarded[0].id, def.id);
}

#[tokio::test]
async fn award_reward_cascades_into_threshold() {
    let engine = test_engine();
    let user = UserId::new();
    let big = define(
        &engine,
        AchievementDefinition::new("Big Task", Trigger::TaskComplete)
            .xp_reward(1000)
            .order_index(1),
    )
    .await;
    let club = define(
        &engine,
        AchievementDefinition::new("Thousand Club", Trigger::XpThreshold { xp: 1000 })
            .order_index(2),
    )
    .await;

    assert_eq!(task_done(&engine, user).await, vec![big.id, club.id]);
}

#[tokio::test]
async fn threshold_matches_on_any_event_kind() {
    let engine = test_engine();
    let user = UserId::new();
    engine
        .credit_xp(user, 60, &EventContext::global())
        .await
        .unwrap();
    let def = define(
        &engine,
        AchievementDefinition::new("Level Two", Trigger::LevelThreshold { level: 2 }),
    )
    .await;

    let evaluation = engine
        .evaluate_trigger(user, &EventKind::LearningComplete, &EventContext::global())
        .await
        .unwrap();
    assert_eq!(evaluation.awarded[0].id, def.id);
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_achievement_does_not_block_others() {
    let engine = test_engine();
    let user = UserId::new();
    let broken = define(
        &engine,
        AchievementDefinition::new("Broken", Trigger::TaskComplete).order_index(1),
    )
    .await;
    let healthy = define(
        &engine,
        AchievementDefinition::new("Healthy", Trigger::TaskComplete)
            .xp_reward(10)
            .order_index(2),
    )
    .await;
    engine.store().fail_achievement(broken.id);

    let evaluation = engine
        .evaluate_trigger(user, &EventKind::TaskComplete, &EventContext::global())
        .await
        .unwrap();

    assert_eq!(evaluation.awarded.len(), 1);
    assert_eq!(evaluation.awarded[0].id, healthy.id);
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].achievement_id, Some(broken.id));
    assert!(matches!(
        evaluation.errors[0].error,
        Error::StoreUnavailable(_)
    ));
}

#[tokio::test]
async fn unreadable_user_state_only_skips_thresholds() {
    let engine = test_engine();
    let user = UserId::new();
    let first = define(
        &engine,
        AchievementDefinition::new("First Steps", Trigger::TaskComplete).xp_reward(10),
    )
    .await;
    let club = define(
        &engine,
        AchievementDefinition::new("Thousand Club", Trigger::XpThreshold { xp: 1000 }),
    )
    .await;
    engine.store().fail_user_state(true);

    let evaluation = engine
        .evaluate_trigger(user, &EventKind::TaskComplete, &EventContext::global())
        .await
        .unwrap();

    assert_eq!(evaluation.awarded.len(), 1);
    assert_eq!(evaluation.awarded[0].id, first.id);
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].achievement_id, None);
    assert!(matches!(
        evaluation.errors[0].error,
        Error::StoreUnavailable(_)
    ));

    let record = engine.store().progress(user, first.id).await.unwrap().unwrap();
    assert!(record.is_earned());
    assert!(engine.store().progress(user, club.id).await.unwrap().is_none());
}

#[tokio::test]
async fn unavailable_store_fails_the_whole_evaluation() {
    let engine = test_engine();
    define(&engine, tasks_counter(1, 10)).await;
    engine.store().set_unavailable(true);

    let result = engine
        .evaluate_trigger(UserId::new(), &EventKind::TaskComplete, &EventContext::global())
        .await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

#[tokio::test]
async fn record_action_swallows_failures() {
    let engine = test_engine();
    define(&engine, tasks_counter(1, 10)).await;
    engine.store().set_unavailable(true);

    let evaluation = engine
        .record_action(
            Some(UserId::new()),
            &EventKind::TaskComplete,
            &EventContext::global(),
        )
        .await;
    assert!(evaluation.awarded.is_empty());
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].achievement_id, None);
}

#[tokio::test]
async fn record_action_without_user_is_empty() {
    let engine = test_engine();
    define(&engine, tasks_counter(1, 10)).await;

    let evaluation = engine
        .record_action(None, &EventKind::TaskComplete, &EventContext::global())
        .await;
    assert!(evaluation.awarded.is_empty());
    assert!(evaluation.is_clean());

    assert!(matches!(require_user(None), Err(Error::Unauthenticated)));
    let user = UserId::new();
    assert_eq!(require_user(Some(user)).unwrap(), user);
}

// ---------------------------------------------------------------------------
// Progress ledger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_or_create_starts_at_zero() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(&engine, tasks_counter(3, 10)).await;

    let record = engine.get_or_create_progress(user, def.id).await.unwrap();
    assert_eq!(record.progress, 0);
    assert_eq!(record.progress_max, 3);
    assert_eq!(record.status(), ProgressStatus::NotStarted);

    let again = engine.get_or_create_progress(user, def.id).await.unwrap();
    assert_eq!(again, record);
}

#[tokio::test]
async fn increment_reports_completion_once() {
    let engine = test_engine();
    let user = UserId::new();
    let def = define(&engine, tasks_counter(3, 10)).await;

    let outcome = engine.increment_progress(user, def.id, 2).await.unwrap();
    assert_eq!(outcome.new_progress(), 2);
    assert!(!outcome.just_completed);

    let outcome = engine.increment_progress(user, def.id, 5).await.unwrap();
    assert_eq!(outcome.new_progress(), 3);
    assert!(outcome.just_completed);

    let err = engine.increment_progress(user, def.id, 1).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyEarned { .. }));
}

#[tokio::test]
async fn increment_rejects_non_positive_delta() {
    let engine = test_engine();
    let def = define(&engine, tasks_counter(3, 10)).await;

    let err = engine
        .increment_progress(UserId::new(), def.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_achievement_is_not_found() {
    let engine = test_engine();
    let missing = AchievementId::new();

    let err = engine
        .get_or_create_progress(UserId::new(), missing)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AchievementNotFound(id) if id == missing));
}

// ---------------------------------------------------------------------------
// XP and levels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn credit_updates_all_counters_and_level() {
    let engine = test_engine();
    let user = UserId::new();

    let credit = engine
        .credit_xp(user, 200, &EventContext::global())
        .await
        .unwrap();
    assert_eq!(credit.state.total_xp, 200);
    assert_eq!(credit.state.weekly_xp, 200);
    assert_eq!(credit.state.monthly_xp, 200);
    assert_eq!(credit.state.level, 3);
    assert!(credit.leveled_up);

    let credit = engine
        .credit_xp(user, 0, &EventContext::global())
        .await
        .unwrap();
    assert_eq!(credit.state.total_xp, 200);
    assert!(!credit.leveled_up);
}

#[tokio::test]
async fn negative_credit_is_rejected() {
    let engine = test_engine();
    let err = engine
        .credit_xp(UserId::new(), -5, &EventContext::global())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_user_reads_as_fresh_state() {
    let engine = test_engine();
    let user = UserId::new();
    let state = engine.user_state(user).await.unwrap();
    assert_eq!(state, UserProgressionState::new(user));
    assert_eq!(state.level, 1);
}

#[tokio::test]
async fn period_reset_keeps_total_and_level() {
    let engine = test_engine();
    let alice = UserId::new();
    let bob = UserId::new();
    for user in [alice, bob] {
        engine
            .credit_xp(user, 100, &EventContext::global())
            .await
            .unwrap();
    }

    assert_eq!(engine.reset_period_counters(Period::Weekly).await.unwrap(), 2);
    assert_eq!(engine.reset_period_counters(Period::Weekly).await.unwrap(), 0);

    let state = engine.user_state(alice).await.unwrap();
    assert_eq!(state.weekly_xp, 0);
    assert_eq!(state.monthly_xp, 100);
    assert_eq!(state.total_xp, 100);
    assert_eq!(state.level, level_for_xp(100));
}

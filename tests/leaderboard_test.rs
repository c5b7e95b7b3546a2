//! Leaderboard ranking over the in-memory store.

use ascent_rs::engine::ProgressionEngine;
use ascent_rs::error::Error;
use ascent_rs::event::EventContext;
use ascent_rs::model::*;
use ascent_rs::store::MemoryStore;
use uuid::Uuid;

fn user(n: u128) -> UserId {
    UserId(Uuid::from_u128(n))
}

fn team(n: u128) -> TeamId {
    TeamId(Uuid::from_u128(0xff00 + n))
}

/// a = 100, b = 100, c = 50, d = 0 (active but no XP).
async fn seeded() -> ProgressionEngine<MemoryStore> {
    let engine = ProgressionEngine::in_memory();
    for (id, xp) in [(1, 100), (2, 100), (3, 50)] {
        engine
            .credit_xp(user(id), xp, &EventContext::global())
            .await
            .unwrap();
    }
    engine
        .touch_activity(user(4), chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .await
        .unwrap();
    engine
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn top_n_orders_by_metric_then_id() {
    let engine = seeded().await;
    let top = engine
        .top_n(Metric::TotalXp, 3, LeaderboardScope::Global)
        .await
        .unwrap();

    let rows: Vec<_> = top
        .iter()
        .map(|e| (e.user_id, e.rank, e.metric_value))
        .collect();
    assert_eq!(
        rows,
        vec![(user(1), 1, 100), (user(2), 2, 100), (user(3), 3, 50)]
    );
}

#[tokio::test]
async fn tied_users_share_a_rank() {
    let engine = seeded().await;
    let global = LeaderboardScope::Global;

    assert_eq!(engine.rank_of(user(1), Metric::TotalXp, global).await.unwrap(), 1);
    assert_eq!(engine.rank_of(user(2), Metric::TotalXp, global).await.unwrap(), 1);
    assert_eq!(engine.rank_of(user(3), Metric::TotalXp, global).await.unwrap(), 3);
    assert_eq!(engine.rank_of(user(4), Metric::TotalXp, global).await.unwrap(), 4);
}

#[tokio::test]
async fn positions_match_top_n() {
    let engine = seeded().await;
    let global = LeaderboardScope::Global;
    let top = engine.top_n(Metric::TotalXp, 10, global).await.unwrap();

    for entry in &top {
        let position = engine
            .position_of(entry.user_id, Metric::TotalXp, global)
            .await
            .unwrap();
        assert_eq!(position, entry.rank);
    }
}

#[tokio::test]
async fn current_user_outside_page_gets_exact_rank() {
    let engine = seeded().await;
    let board = engine
        .get_leaderboard(Metric::TotalXp, LeaderboardScope::Global, 2, Some(user(3)))
        .await
        .unwrap();

    assert_eq!(board.entries.len(), 2);
    let me = board.current_user.unwrap();
    assert_eq!(me.user_id, user(3));
    assert_eq!(me.rank, 3);
    assert_eq!(me.position, 3);
    assert_eq!(me.metric_value, 50);
}

#[tokio::test]
async fn user_without_activity_ranks_after_everyone_with_xp() {
    let engine = seeded().await;
    let stranger = user(99);
    let global = LeaderboardScope::Global;

    assert_eq!(engine.rank_of(stranger, Metric::TotalXp, global).await.unwrap(), 4);
    // d also has 0 XP and a smaller id.
    assert_eq!(
        engine.position_of(stranger, Metric::TotalXp, global).await.unwrap(),
        5
    );
}

#[tokio::test]
async fn zero_page_size_is_rejected() {
    let engine = seeded().await;
    let err = engine
        .top_n(Metric::TotalXp, 0, LeaderboardScope::Global)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = engine.top_teams(Metric::TotalXp, 0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn weekly_metric_follows_reset() {
    let engine = seeded().await;
    engine.reset_period_counters(Period::Weekly).await.unwrap();
    engine
        .credit_xp(user(3), 10, &EventContext::global())
        .await
        .unwrap();

    let top = engine
        .top_n(Metric::WeeklyXp, 1, LeaderboardScope::Global)
        .await
        .unwrap();
    assert_eq!(top[0].user_id, user(3));
    assert_eq!(top[0].metric_value, 10);

    // Total XP ordering is unaffected.
    let top = engine
        .top_n(Metric::TotalXp, 1, LeaderboardScope::Global)
        .await
        .unwrap();
    assert_eq!(top[0].user_id, user(1));
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn team_scope_ranks_only_members() {
    let engine = seeded().await;
    engine.add_team_member(team(1), user(2)).await.unwrap();
    engine.add_team_member(team(1), user(3)).await.unwrap();
    engine.add_team_member(team(1), user(3)).await.unwrap();

    let scope = LeaderboardScope::Team(team(1));
    let top = engine.top_n(Metric::TotalXp, 10, scope).await.unwrap();
    let members: Vec<_> = top.iter().map(|e| e.user_id).collect();
    assert_eq!(members, vec![user(2), user(3)]);

    assert_eq!(engine.rank_of(user(3), Metric::TotalXp, scope).await.unwrap(), 2);
}

#[tokio::test]
async fn teams_rank_by_summed_member_xp() {
    let engine = seeded().await;
    engine.add_team_member(team(1), user(1)).await.unwrap();
    engine.add_team_member(team(1), user(3)).await.unwrap();
    engine.add_team_member(team(2), user(2)).await.unwrap();
    engine.add_team_member(team(3), user(4)).await.unwrap();

    let standings = engine.top_teams(Metric::TotalXp, 10).await.unwrap();
    let rows: Vec<_> = standings
        .iter()
        .map(|s| (s.team_id, s.rank, s.metric_value))
        .collect();
    assert_eq!(
        rows,
        vec![(team(1), 1, 150), (team(2), 2, 100), (team(3), 3, 0)]
    );

    assert_eq!(engine.team_rank(team(2), Metric::TotalXp).await.unwrap(), 2);
    assert_eq!(engine.team_rank(team(3), Metric::TotalXp).await.unwrap(), 3);
}

//! ascent CLI: operator interface to the progression engine.

use std::path::PathBuf;
use std::sync::Arc;

use ascent_rs::catalog::Catalog;
use ascent_rs::config::Config;
use ascent_rs::db::Db;
use ascent_rs::engine::{Evaluation, ProgressionEngine};
use ascent_rs::event::{EventContext, EventKind};
use ascent_rs::model::{
    AchievementId, LeaderboardScope, Metric, Period, ProjectId, Scope, TeamId, UserId,
};
use ascent_rs::telemetry::{TelemetryConfig, init_telemetry};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;

type Engine = ProgressionEngine<Db>;

#[derive(Parser)]
#[command(name = "ascent", about = "Achievements, XP, streaks, and leaderboards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Achievement catalog operations
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Record a user action and report what it earned
    Event {
        user: UserId,
        /// task_complete, project_complete, learning_complete, or a count category.
        /// Completions already count toward tasks, projects, or learning.
        kind: EventKind,
        #[arg(long)]
        team: Option<TeamId>,
        #[arg(long)]
        project: Option<ProjectId>,
    },
    /// Credit XP directly
    Credit {
        user: UserId,
        amount: i64,
        #[arg(long)]
        team: Option<TeamId>,
    },
    /// Record daily activity for the streak
    Touch {
        user: UserId,
        /// Day to record (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Award an achievement outright
    Award {
        user: UserId,
        achievement: AchievementId,
    },
    /// Show a user's achievements and progress
    Achievements {
        user: UserId,
        #[arg(long, conflicts_with = "project")]
        team: Option<TeamId>,
        #[arg(long)]
        project: Option<ProjectId>,
    },
    /// Show the user leaderboard
    Leaderboard {
        /// total, weekly, or monthly
        #[arg(long, default_value = "total")]
        metric: Metric,
        /// Rank only members of this team
        #[arg(long)]
        team: Option<TeamId>,
        #[arg(long, default_value_t = 10)]
        limit: u64,
        /// Also show where this user stands
        #[arg(long)]
        user: Option<UserId>,
    },
    /// Show the team leaderboard
    TeamLeaderboard {
        #[arg(long, default_value = "total")]
        metric: Metric,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Team membership operations
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },
    /// Zero the weekly or monthly XP counters
    Reset { period: Period },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Upsert every definition found in the catalog directory
    Sync {
        /// Directory of catalog TOML files; defaults to CATALOG_DIR or ./catalog
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TeamAction {
    /// Add a user to a team
    AddMember { team: TeamId, user: UserId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "ascent"))?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;

    if matches!(cli.command, Command::Migrate) {
        println!("Migrations applied.");
        return Ok(());
    }

    let engine = ProgressionEngine::new(Arc::new(db), (&config).into());

    match cli.command {
        Command::Migrate => Ok(()),
        Command::Catalog {
            action: CatalogAction::Sync { dir },
        } => {
            let dir = dir
                .or_else(|| config.catalog_dir.clone())
                .unwrap_or_else(|| PathBuf::from("catalog"));
            cmd_catalog_sync(&engine, dir).await
        }
        Command::Event {
            user,
            kind,
            team,
            project,
        } => {
            let context = EventContext { team, project };
            let evaluation = engine.evaluate_trigger(user, &kind, &context).await?;
            print_evaluation(&evaluation);
            Ok(())
        }
        Command::Credit { user, amount, team } => {
            let context = EventContext {
                team,
                project: None,
            };
            let credit = engine.credit_xp(user, amount, &context).await?;
            println!(
                "Total XP: {}  Level: {}{}",
                credit.state.total_xp,
                credit.state.level,
                if credit.leveled_up { "  (level up!)" } else { "" }
            );
            print_evaluation(&credit.evaluation);
            Ok(())
        }
        Command::Touch { user, date } => {
            let update = match date {
                Some(day) => engine.touch_activity(user, day).await?,
                None => engine.touch_daily_activity(user).await?,
            };
            println!(
                "Streak: {} (longest {})  [{}]",
                update.current_streak,
                update.longest_streak,
                update.change.as_str()
            );
            Ok(())
        }
        Command::Award { user, achievement } => {
            let result = engine.award(user, achievement).await?;
            match result.achievement {
                Some(def) => println!("Awarded: {} (+{} XP)", def.name, def.xp_reward),
                None => println!("Already earned, nothing changed."),
            }
            Ok(())
        }
        Command::Achievements {
            user,
            team,
            project,
        } => {
            let scope = match (team, project) {
                (Some(team), _) => Scope::Team(team),
                (None, Some(project)) => Scope::Project(project),
                (None, None) => Scope::Global,
            };
            cmd_achievements(&engine, user, scope).await
        }
        Command::Leaderboard {
            metric,
            team,
            limit,
            user,
        } => {
            let scope = team.map_or(LeaderboardScope::Global, LeaderboardScope::Team);
            cmd_leaderboard(&engine, metric, scope, limit, user).await
        }
        Command::TeamLeaderboard { metric, limit } => {
            cmd_team_leaderboard(&engine, metric, limit).await
        }
        Command::Team {
            action: TeamAction::AddMember { team, user },
        } => {
            engine.add_team_member(team, user).await?;
            println!("Added {user} to team {team}.");
            Ok(())
        }
        Command::Reset { period } => {
            let changed = engine.reset_period_counters(period).await?;
            println!("Reset {period:?} XP for {changed} user(s).");
            Ok(())
        }
    }
}

async fn cmd_catalog_sync(engine: &Engine, dir: PathBuf) -> anyhow::Result<()> {
    let catalog = Catalog::load_from_dir(&dir)?;
    if catalog.is_empty() {
        println!("No achievements found in {}.", dir.display());
        return Ok(());
    }

    let synced = engine.sync_catalog(&catalog).await?;
    println!("Synced {synced} achievement(s) from {}.", dir.display());
    Ok(())
}

async fn cmd_achievements(engine: &Engine, user: UserId, scope: Scope) -> anyhow::Result<()> {
    let views = engine.get_achievements(user, scope).await?;
    if views.is_empty() {
        println!("No achievements in scope {scope}.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<28}  {:<18}  {:<9}  {:<6}  EARNED",
        "ID", "NAME", "TRIGGER", "PROGRESS", "XP"
    );
    println!("{}", "-".repeat(96));

    for view in &views {
        let def = &view.achievement;
        let short_id = &def.id.to_string()[..8];
        let name: String = def.name.chars().take(28).collect();
        let earned = view
            .earned_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<28}  {:<18}  {:<9}  {:<6}  {}",
            short_id,
            name,
            def.trigger.kind(),
            format!("{}/{}", view.progress, view.progress_max),
            def.xp_reward,
            earned
        );
    }

    let earned = views.iter().filter(|v| v.earned_at.is_some()).count();
    println!("\n{earned} of {} earned", views.len());
    Ok(())
}

async fn cmd_leaderboard(
    engine: &Engine,
    metric: Metric,
    scope: LeaderboardScope,
    limit: u64,
    user: Option<UserId>,
) -> anyhow::Result<()> {
    let board = engine.get_leaderboard(metric, scope, limit, user).await?;

    println!("{:<6}  {:<36}  {}", "RANK", "USER", metric.column().to_uppercase());
    println!("{}", "-".repeat(60));
    for entry in &board.entries {
        println!(
            "{:<6}  {:<36}  {}",
            entry.rank, entry.user_id, entry.metric_value
        );
    }

    if let Some(me) = board.current_user {
        println!(
            "\n{}: rank {} (position {}) with {}",
            me.user_id, me.rank, me.position, me.metric_value
        );
    }
    Ok(())
}

async fn cmd_team_leaderboard(engine: &Engine, metric: Metric, limit: u64) -> anyhow::Result<()> {
    let teams = engine.top_teams(metric, limit).await?;
    if teams.is_empty() {
        println!("No teams found.");
        return Ok(());
    }

    println!("{:<6}  {:<36}  {}", "RANK", "TEAM", metric.column().to_uppercase());
    println!("{}", "-".repeat(60));
    for standing in &teams {
        println!(
            "{:<6}  {:<36}  {}",
            standing.rank, standing.team_id, standing.metric_value
        );
    }
    Ok(())
}

fn print_evaluation(evaluation: &Evaluation) {
    if evaluation.awarded.is_empty() {
        println!("No achievements earned.");
    }
    for def in &evaluation.awarded {
        println!("Earned: {} (+{} XP)", def.name, def.xp_reward);
    }
    for failure in &evaluation.errors {
        match failure.achievement_id {
            Some(id) => eprintln!("Failed {id}: {}", failure.error),
            None => eprintln!("Failed: {}", failure.error),
        }
    }
}

//! Achievement catalog storage.

use uuid::Uuid;

use crate::error::Result;
use crate::model::{AchievementDefinition, AchievementId, Scope, Trigger};

const ACHIEVEMENT_COLUMNS: &str = "id, name, description, scope, scope_ref, trigger_type, \
     trigger_value, category, progress_max, xp_reward, is_active, order_index";

impl super::Db {
    /// Active achievements of exactly `scope`, in display order.
    pub async fn list_active_achievements(
        &self,
        scope: Scope,
    ) -> Result<Vec<AchievementDefinition>> {
        let rows: Vec<AchievementRow> = sqlx::query_as(&format!(
            "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements
             WHERE is_active AND scope = $1 AND scope_ref IS NOT DISTINCT FROM $2
             ORDER BY order_index ASC, id ASC"
        ))
        .bind(scope.kind())
        .bind(scope.scope_ref())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(AchievementRow::try_into_definition).collect()
    }

    /// Get an achievement by ID.
    pub async fn get_achievement(&self, id: AchievementId) -> Result<Option<AchievementDefinition>> {
        let row: Option<AchievementRow> = sqlx::query_as(&format!(
            "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(AchievementRow::try_into_definition).transpose()
    }

    /// Insert or replace a catalog entry.
    pub async fn save_achievement(&self, def: &AchievementDefinition) -> Result<()> {
        def.validate()?;

        sqlx::query(
            "INSERT INTO achievements (id, name, description, scope, scope_ref, trigger_type,
                                       trigger_value, category, progress_max, xp_reward,
                                       is_active, order_index)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                name          = EXCLUDED.name,
                description   = EXCLUDED.description,
                scope         = EXCLUDED.scope,
                scope_ref     = EXCLUDED.scope_ref,
                trigger_type  = EXCLUDED.trigger_type,
                trigger_value = EXCLUDED.trigger_value,
                category      = EXCLUDED.category,
                progress_max  = EXCLUDED.progress_max,
                xp_reward     = EXCLUDED.xp_reward,
                is_active     = EXCLUDED.is_active,
                order_index   = EXCLUDED.order_index,
                updated_at    = now()",
        )
        .bind(def.id.0)
        .bind(&def.name)
        .bind(&def.description)
        .bind(def.scope.kind())
        .bind(def.scope.scope_ref())
        .bind(def.trigger.kind())
        .bind(def.trigger.value())
        .bind(def.trigger.category())
        .bind(def.progress_max)
        .bind(def.xp_reward)
        .bind(def.is_active)
        .bind(def.order_index)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct AchievementRow {
    id: Uuid,
    name: String,
    description: String,
    scope: String,
    scope_ref: Option<Uuid>,
    trigger_type: String,
    trigger_value: Option<i64>,
    category: Option<String>,
    progress_max: Option<i64>,
    xp_reward: i64,
    is_active: bool,
    order_index: i32,
}

impl AchievementRow {
    fn try_into_definition(self) -> Result<AchievementDefinition> {
        Ok(AchievementDefinition {
            id: AchievementId(self.id),
            name: self.name,
            description: self.description,
            scope: Scope::from_parts(&self.scope, self.scope_ref)?,
            trigger: Trigger::from_parts(&self.trigger_type, self.trigger_value, self.category)?,
            progress_max: self.progress_max,
            xp_reward: self.xp_reward,
            is_active: self.is_active,
            order_index: self.order_index,
        })
    }
}

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};

use crate::{entity::activity_logs::ActiveModel as ActivityLogActive, state::AppState};

/// Record an admin action. Best-effort: callers log failures and move on,
/// an audit miss must never fail the request it describes.
pub async fn log_activity(
    state: &AppState,
    admin_id: i32,
    action: &str,
    details: Option<String>,
) -> Result<(), sea_orm::DbErr> {
    ActivityLogActive {
        id: NotSet,
        admin_id: Set(admin_id),
        action: Set(action.to_string()),
        details: Set(details),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(())
}

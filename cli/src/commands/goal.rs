use anyhow::{Result, bail};

use mealtrack_core::db::Database;
use mealtrack_core::models::GoalValues;

use super::helpers::parse_day;

pub(crate) fn cmd_goal_set(
    db: &Database,
    user_id: i64,
    goal: GoalValues,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    for (field, value) in [
        ("protein", goal.protein_goal),
        ("carbs", goal.carbs_goal),
        ("calories", goal.calories_goal),
    ] {
        if !value.is_finite() {
            bail!("{field} goal must be a finite number");
        }
    }
    if db.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }

    let day = parse_day(date);
    let saved = db.update_daily_goal(user_id, &day, &goal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!(
            "Goal for user {user_id} on {}: {} kcal | P:{}g C:{}g",
            saved.date, saved.calories_goal, saved.protein_goal, saved.carbs_goal
        );
    }
    Ok(())
}

use anyhow::{Result, bail};
use std::process;

use mealtrack_core::db::{Database, is_constraint_violation};
use mealtrack_core::models::NewMealLog;

use super::helpers::{json_error, parse_day};

pub(crate) fn cmd_log(
    db: &Database,
    user_id: i64,
    food_id: i64,
    quantity: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if !quantity.is_finite() {
        bail!("quantity must be a finite number");
    }

    let new_log = NewMealLog {
        user_id,
        food_id,
        quantity,
        date: parse_day(date),
    };
    let log = match db.create_meal_log(&new_log) {
        Ok(log) => log,
        Err(err) if is_constraint_violation(&err) => {
            bail!("Unknown user {user_id} or food {food_id}")
        }
        Err(err) => return Err(err),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        println!(
            "Logged {} x food {} for user {} on {} (entry {})",
            log.quantity, log.food_id, log.user_id, log.date, log.id
        );
    }
    Ok(())
}

pub(crate) fn cmd_unlog(db: &Database, log_id: i64, json: bool) -> Result<()> {
    if let Some(log) = db.delete_meal_log(log_id)? {
        if json {
            println!("{}", serde_json::to_string_pretty(&log)?);
        } else {
            println!(
                "Deleted entry {log_id} (user {} on {})",
                log.user_id, log.date
            );
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {log_id} not found")));
        } else {
            eprintln!("Entry {log_id} not found");
        }
        process::exit(2);
    }
}

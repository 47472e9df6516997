use anyhow::Result;
use std::process;

use mealtrack_core::db::Database;
use mealtrack_core::models::DailySummary;

use super::helpers::{json_error, no_neg_zero, parse_day};

pub(crate) fn cmd_summary(
    db: &Database,
    user_id: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if db.get_user(user_id)?.is_none() {
        let message = format!("User {user_id} not found");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    let day = parse_day(date);
    let summary = db.build_daily_summary(user_id, &day)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &DailySummary) {
    let date = &summary.date;
    println!("=== {date} ===\n");

    if summary.logs.is_empty() {
        println!("  No entries");
    }
    for e in &summary.logs {
        let id = e.id;
        let name = &e.food_name;
        let qty = e.quantity;
        let (p, c, cal) = (e.protein, e.carbs, e.calories);
        println!("  [{id}] {name} x{qty} — {cal:.0} kcal | P:{p:.1}g C:{c:.1}g");
    }
    println!();

    let total_p = no_neg_zero(summary.total_protein);
    let total_c = no_neg_zero(summary.total_carbs);
    let total_cal = no_neg_zero(summary.total_calories);
    println!("  TOTAL: {total_cal:.0} kcal | P:{total_p:.1}g C:{total_c:.1}g");

    let goal = &summary.goal;
    let (gp, gc, gcal) = (goal.protein_goal, goal.carbs_goal, goal.calories_goal);
    println!("  GOAL: {gcal:.0} kcal | P:{gp:.1}g C:{gc:.1}g");

    let rcal = no_neg_zero(gcal - total_cal);
    let rp = no_neg_zero(gp - total_p);
    let rc = no_neg_zero(gc - total_c);
    println!("  REMAINING: {rcal:.0} kcal | P:{rp:.1}g C:{rc:.1}g");
}

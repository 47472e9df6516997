use anyhow::{Result, bail};

use mealtrack_core::db::Database;
use mealtrack_core::models::NewFood;

use super::helpers::print_food_table;

pub(crate) fn cmd_food_add(
    db: &Database,
    name: &str,
    protein: f64,
    carbs: f64,
    calories: f64,
    json: bool,
) -> Result<()> {
    for (field, value) in [("protein", protein), ("carbs", carbs), ("calories", calories)] {
        if !value.is_finite() {
            bail!("{field} must be a finite number");
        }
    }

    let food = db.create_food(&NewFood {
        name: name.to_string(),
        protein,
        carbs,
        calories,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!(
            "Created food {} ({}): P:{}g C:{}g {} kcal per unit",
            food.name, food.id, food.protein, food.carbs, food.calories
        );
    }
    Ok(())
}

pub(crate) fn cmd_food_list(db: &Database, json: bool) -> Result<()> {
    let foods = db.list_foods()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else if foods.is_empty() {
        eprintln!("No foods yet. Use `mealtrack food add` to create one.");
    } else {
        print_food_table(&foods);
    }
    Ok(())
}

pub(crate) fn cmd_food_delete(db: &Database, food_id: i64, json: bool) -> Result<()> {
    let deleted = db.delete_food(food_id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "food_id": food_id }));
    } else if deleted {
        println!("Deleted food {food_id} and every meal log using it");
    } else {
        eprintln!("No food {food_id}; nothing deleted");
    }
    Ok(())
}

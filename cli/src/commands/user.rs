use anyhow::Result;
use std::process;
use tabled::{Table, Tabled, settings::Style};

use mealtrack_core::db::Database;
use mealtrack_core::models::Dashboard;

use super::helpers::{json_error, print_food_table, today};

pub(crate) fn cmd_user_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
    }

    let users = db.list_users()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        eprintln!("No users yet. Use `mealtrack user add <name>` to create one.");
        return Ok(());
    }

    let rows: Vec<UserRow> = users
        .into_iter()
        .map(|u| UserRow {
            id: u.id,
            name: u.name,
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_user_add(db: &Database, name: &str, json: bool) -> Result<()> {
    let user = db.create_user(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!("Created user {} ({})", user.name, user.id);
    }
    Ok(())
}

pub(crate) fn cmd_user_delete(db: &Database, user_id: i64, json: bool) -> Result<()> {
    let deleted = db.delete_user(user_id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "user_id": user_id }));
    } else if deleted {
        println!("Deleted user {user_id} and all of their meal logs and goals");
    } else {
        eprintln!("No user {user_id}; nothing deleted");
    }
    Ok(())
}

pub(crate) fn cmd_user_show(db: &Database, user_id: i64, json: bool) -> Result<()> {
    let Some(user) = db.get_user(user_id)? else {
        let message = format!("User {user_id} not found");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    };

    let dashboard = Dashboard {
        user,
        foods: db.list_foods()?,
        today: today(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    let name = &dashboard.user.name;
    let today = &dashboard.today;
    println!("=== {name} ({today}) ===\n");
    if dashboard.foods.is_empty() {
        eprintln!("No foods yet. Use `mealtrack food add` to create one.");
    } else {
        print_food_table(&dashboard.foods);
    }
    Ok(())
}

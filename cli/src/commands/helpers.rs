use chrono::{Duration, Local};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealtrack_core::models::Food;

pub(crate) fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Resolve a day argument. Keywords map to local dates; anything else is
/// taken verbatim since stored dates are opaque strings.
pub(crate) fn parse_day(day: Option<String>) -> String {
    let today = Local::now().date_naive();
    match day.as_deref() {
        None | Some("today") => today.format("%Y-%m-%d").to_string(),
        Some("yesterday") => (today - Duration::days(1)).format("%Y-%m-%d").to_string(),
        Some("tomorrow") => (today + Duration::days(1)).format("%Y-%m-%d").to_string(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn print_food_table(foods: &[Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Calories")]
        calories: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(&f.name, 35),
            protein: format!("{:.1}", f.protein),
            carbs: format!("{:.1}", f.carbs),
            calories: format!("{:.0}", f.calories),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

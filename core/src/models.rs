use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A food with nutrient values per single unit of quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub protein: f64,
    pub carbs: f64,
    pub calories: f64,
}

#[derive(Debug, Clone)]
pub struct NewFood {
    pub name: String,
    pub protein: f64,
    pub carbs: f64,
    pub calories: f64,
}

/// "User consumed `quantity` units of `food_id` on `date`."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLog {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub quantity: f64,
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct NewMealLog {
    pub user_id: i64,
    pub food_id: i64,
    pub quantity: f64,
    pub date: String,
}

/// A meal log joined with its food, carrying the quantity-weighted nutrients.
#[derive(Debug, Clone, Serialize)]
pub struct MealLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub quantity: f64,
    pub date: String,
    pub food_name: String,
    pub protein: f64,
    pub carbs: f64,
    pub calories: f64,
}

impl MealLogEntry {
    #[must_use]
    pub fn new(log: MealLog, food: &Food) -> Self {
        Self {
            protein: log.quantity * food.protein,
            carbs: log.quantity * food.carbs,
            calories: log.quantity * food.calories,
            food_name: food.name.clone(),
            id: log.id,
            user_id: log.user_id,
            food_id: log.food_id,
            quantity: log.quantity,
            date: log.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyGoal {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub protein_goal: f64,
    pub carbs_goal: f64,
    pub calories_goal: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalValues {
    pub protein_goal: f64,
    pub carbs_goal: f64,
    pub calories_goal: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub protein: f64,
    pub carbs: f64,
    pub calories: f64,
}

impl DailyTotals {
    /// Sum the quantity-weighted nutrients of every entry. No rounding.
    #[must_use]
    pub fn from_entries(entries: &[MealLogEntry]) -> Self {
        entries.iter().fold(Self::default(), |acc, e| Self {
            protein: acc.protein + e.protein,
            carbs: acc.carbs + e.carbs,
            calories: acc.calories + e.calories,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub user_id: i64,
    pub date: String,
    pub logs: Vec<MealLogEntry>,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_calories: f64,
    pub goal: DailyGoal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub foods: Vec<Food>,
    pub today: String,
}

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    DailyGoal, DailySummary, DailyTotals, Food, GoalValues, MealLog, MealLogEntry, NewFood,
    NewMealLog, User,
};

pub struct Database {
    conn: Connection,
}

/// True when `err` comes from a statement the store rejected on a constraint,
/// e.g. a meal log pointing at a user or food that does not exist.
#[must_use]
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Per-connection setting, not persisted in the file.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    protein REAL NOT NULL,
                    carbs REAL NOT NULL,
                    calories REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    quantity REAL NOT NULL,
                    date TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_goals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    date TEXT NOT NULL,
                    protein_goal REAL NOT NULL DEFAULT 0,
                    carbs_goal REAL NOT NULL DEFAULT 0,
                    calories_goal REAL NOT NULL DEFAULT 0,
                    UNIQUE (user_id, date)
                );

                CREATE INDEX IF NOT EXISTS idx_meal_logs_user_date ON meal_logs(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_meal_logs_food ON meal_logs(food_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            name: row.get(1)?,
            protein: row.get(2)?,
            carbs: row.get(3)?,
            calories: row.get(4)?,
        })
    }

    fn meal_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealLog> {
        Ok(MealLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            food_id: row.get(2)?,
            quantity: row.get(3)?,
            date: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: ml.id, 1: ml.user_id, 2: ml.food_id, 3: ml.quantity, 4: ml.date,
    // 5: f.id, 6: f.name, 7: f.protein, 8: f.carbs, 9: f.calories
    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealLogEntry> {
        let log = Self::meal_log_from_row(row)?;
        let food = Food {
            id: row.get(5)?,
            name: row.get(6)?,
            protein: row.get(7)?,
            carbs: row.get(8)?,
            calories: row.get(9)?,
        };
        Ok(MealLogEntry::new(log, &food))
    }

    fn goal_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyGoal> {
        Ok(DailyGoal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            protein_goal: row.get(3)?,
            carbs_goal: row.get(4)?,
            calories_goal: row.get(5)?,
        })
    }

    // --- Users ---

    pub fn create_user(&self, name: &str) -> Result<User> {
        self.conn
            .execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        Ok(User {
            id,
            name: name.to_string(),
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Delete a user together with its meal logs and goals.
    ///
    /// Returns `false` without touching anything when the user does not exist.
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![user_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }
        tx.execute("DELETE FROM meal_logs WHERE user_id = ?1", params![user_id])?;
        tx.execute(
            "DELETE FROM daily_goals WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(true)
    }

    // --- Foods ---

    pub fn create_food(&self, food: &NewFood) -> Result<Food> {
        self.conn.execute(
            "INSERT INTO foods (name, protein, carbs, calories) VALUES (?1, ?2, ?3, ?4)",
            params![food.name, food.protein, food.carbs, food.calories],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Food {
            id,
            name: food.name.clone(),
            protein: food.protein,
            carbs: food.carbs,
            calories: food.calories,
        })
    }

    pub fn get_food(&self, id: i64) -> Result<Option<Food>> {
        let food = self
            .conn
            .query_row(
                "SELECT id, name, protein, carbs, calories FROM foods WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .optional()?;
        Ok(food)
    }

    pub fn list_foods(&self) -> Result<Vec<Food>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, protein, carbs, calories FROM foods ORDER BY id")?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Delete a food and every meal log referencing it.
    pub fn delete_food(&self, food_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM foods WHERE id = ?1",
                params![food_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }
        tx.execute("DELETE FROM meal_logs WHERE food_id = ?1", params![food_id])?;
        tx.execute("DELETE FROM foods WHERE id = ?1", params![food_id])?;
        tx.commit()?;
        Ok(true)
    }

    // --- Meal logs ---

    pub fn create_meal_log(&self, log: &NewMealLog) -> Result<MealLog> {
        self.conn.execute(
            "INSERT INTO meal_logs (user_id, food_id, quantity, date) VALUES (?1, ?2, ?3, ?4)",
            params![log.user_id, log.food_id, log.quantity, log.date],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(MealLog {
            id,
            user_id: log.user_id,
            food_id: log.food_id,
            quantity: log.quantity,
            date: log.date.clone(),
        })
    }

    pub fn get_meal_log(&self, id: i64) -> Result<Option<MealLog>> {
        let log = self
            .conn
            .query_row(
                "SELECT id, user_id, food_id, quantity, date FROM meal_logs WHERE id = ?1",
                params![id],
                Self::meal_log_from_row,
            )
            .optional()?;
        Ok(log)
    }

    /// Delete a meal log, returning the removed row so callers know which
    /// `(user_id, date)` it belonged to. `None` means nothing was deleted.
    pub fn delete_meal_log(&self, log_id: i64) -> Result<Option<MealLog>> {
        let tx = self.conn.unchecked_transaction()?;
        let log = tx
            .query_row(
                "SELECT id, user_id, food_id, quantity, date FROM meal_logs WHERE id = ?1",
                params![log_id],
                Self::meal_log_from_row,
            )
            .optional()?;
        if log.is_some() {
            tx.execute("DELETE FROM meal_logs WHERE id = ?1", params![log_id])?;
            tx.commit()?;
        }
        Ok(log)
    }

    pub fn meal_logs_for_day(&self, user_id: i64, date: &str) -> Result<Vec<MealLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT ml.id, ml.user_id, ml.food_id, ml.quantity, ml.date,
                    f.id, f.name, f.protein, f.carbs, f.calories
             FROM meal_logs ml
             JOIN foods f ON ml.food_id = f.id
             WHERE ml.user_id = ?1 AND ml.date = ?2
             ORDER BY ml.id",
        )?;
        let entries = stmt
            .query_map(params![user_id, date], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn daily_totals(&self, user_id: i64, date: &str) -> Result<DailyTotals> {
        let entries = self.meal_logs_for_day(user_id, date)?;
        Ok(DailyTotals::from_entries(&entries))
    }

    // --- Daily goals ---

    fn get_daily_goal(&self, user_id: i64, date: &str) -> Result<DailyGoal> {
        self.conn
            .query_row(
                "SELECT id, user_id, date, protein_goal, carbs_goal, calories_goal
                 FROM daily_goals WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                Self::goal_from_row,
            )
            .context("Daily goal not found after upsert")
    }

    /// Return the goal for `(user_id, date)`, inserting a zero-valued row first
    /// if there is none. The insert is a no-op on conflict, so concurrent
    /// callers all end up with the same row.
    pub fn get_or_create_daily_goal(&self, user_id: i64, date: &str) -> Result<DailyGoal> {
        self.conn.execute(
            "INSERT INTO daily_goals (user_id, date) VALUES (?1, ?2)
             ON CONFLICT(user_id, date) DO NOTHING",
            params![user_id, date],
        )?;
        self.get_daily_goal(user_id, date)
    }

    pub fn update_daily_goal(
        &self,
        user_id: i64,
        date: &str,
        goal: &GoalValues,
    ) -> Result<DailyGoal> {
        self.conn.execute(
            "INSERT INTO daily_goals (user_id, date, protein_goal, carbs_goal, calories_goal)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, date) DO UPDATE SET
                protein_goal = excluded.protein_goal,
                carbs_goal = excluded.carbs_goal,
                calories_goal = excluded.calories_goal",
            params![
                user_id,
                date,
                goal.protein_goal,
                goal.carbs_goal,
                goal.calories_goal
            ],
        )?;
        self.get_daily_goal(user_id, date)
    }

    // --- Summary ---

    pub fn build_daily_summary(&self, user_id: i64, date: &str) -> Result<DailySummary> {
        let logs = self.meal_logs_for_day(user_id, date)?;
        let totals = DailyTotals::from_entries(&logs);
        let goal = self.get_or_create_daily_goal(user_id, date)?;

        Ok(DailySummary {
            user_id,
            date: date.to_string(),
            logs,
            total_protein: totals.protein,
            total_carbs: totals.carbs,
            total_calories: totals.calories,
            goal,
        })
    }
}

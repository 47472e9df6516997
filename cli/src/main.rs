mod commands;
mod config;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;

use crate::commands::{
    cmd_food_add, cmd_food_delete, cmd_food_list, cmd_goal_set, cmd_log, cmd_summary, cmd_unlog,
    cmd_user_add, cmd_user_delete, cmd_user_list, cmd_user_show,
};
use crate::config::Config;
use mealtrack_core::db::Database;
use mealtrack_core::models::GoalValues;

#[derive(Parser)]
#[command(
    name = "mealtrack",
    version,
    about = "Track meals and macro-nutrients against daily goals"
)]
struct Cli {
    /// Path to the SQLite store (default: per-user data directory)
    #[arg(long, global = true, env = "MEALTRACK_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage foods (nutrients are per unit of quantity)
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log a meal: QUANTITY units of a food eaten by a user
    Log {
        /// User ID
        user_id: i64,
        /// Food ID
        food_id: i64,
        /// Number of units eaten
        quantity: f64,
        /// Date to log for (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal log entry by ID
    Unlog {
        /// Entry ID to delete
        log_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's totals and goal for a day (defaults to today)
    Summary {
        /// User ID
        user_id: i64,
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a user
    Add {
        /// Display name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a user with all of their meal logs and goals
    Delete {
        /// User ID
        user_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's dashboard: the food list and today's date
    Show {
        /// User ID
        user_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// List all foods
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food
    Add {
        /// Food name
        name: String,
        /// Protein per unit
        #[arg(long)]
        protein: f64,
        /// Carbs per unit
        #[arg(long)]
        carbs: f64,
        /// Calories per unit
        #[arg(long)]
        calories: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food and every meal log using it
    Delete {
        /// Food ID
        food_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set a user's goal for a day (default: today)
    Set {
        /// User ID
        user_id: i64,
        /// Protein goal
        #[arg(long)]
        protein: f64,
        /// Carbs goal
        #[arg(long)]
        carbs: f64,
        /// Calories goal
        #[arg(long)]
        calories: f64,
        /// Date the goal applies to (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    debug!(path = %config.db_path.display(), "opening store");
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::List { json } => cmd_user_list(&db, json),
            UserCommands::Add { name, json } => cmd_user_add(&db, &name, json),
            UserCommands::Delete { user_id, json } => cmd_user_delete(&db, user_id, json),
            UserCommands::Show { user_id, json } => cmd_user_show(&db, user_id, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::List { json } => cmd_food_list(&db, json),
            FoodCommands::Add {
                name,
                protein,
                carbs,
                calories,
                json,
            } => cmd_food_add(&db, &name, protein, carbs, calories, json),
            FoodCommands::Delete { food_id, json } => cmd_food_delete(&db, food_id, json),
        },
        Commands::Log {
            user_id,
            food_id,
            quantity,
            date,
            json,
        } => cmd_log(&db, user_id, food_id, quantity, date, json),
        Commands::Unlog { log_id, json } => cmd_unlog(&db, log_id, json),
        Commands::Summary {
            user_id,
            date,
            json,
        } => cmd_summary(&db, user_id, date, json),
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                user_id,
                protein,
                carbs,
                calories,
                date,
                json,
            } => cmd_goal_set(
                &db,
                user_id,
                GoalValues {
                    protein_goal: protein,
                    carbs_goal: carbs,
                    calories_goal: calories,
                },
                date,
                json,
            ),
        },
        Commands::Serve { port, bind } => server::start_server(db, port, &bind).await,
    }
}

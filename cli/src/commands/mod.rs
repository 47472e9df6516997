mod food;
mod goal;
mod helpers;
mod meal;
mod summary;
mod user;

pub(crate) use food::{cmd_food_add, cmd_food_delete, cmd_food_list};
pub(crate) use goal::cmd_goal_set;
pub(crate) use helpers::today;
pub(crate) use meal::{cmd_log, cmd_unlog};
pub(crate) use summary::cmd_summary;
pub(crate) use user::{cmd_user_add, cmd_user_delete, cmd_user_list, cmd_user_show};

mod chat;
mod diary;
mod food;
mod helpers;
mod plan;
mod profile;
mod sugar;

pub(crate) use chat::{cmd_chat_analyze, cmd_chat_history, cmd_chat_send, cmd_scan};
pub(crate) use diary::{cmd_diary_log, cmd_diary_settings, cmd_diary_timeline};
pub(crate) use food::{cmd_food_delete, cmd_food_list, cmd_food_log, cmd_food_summary};
pub(crate) use plan::{cmd_plan_delete, cmd_plan_generate, cmd_plan_list, cmd_plan_show};
pub(crate) use profile::{
    cmd_profile_create, cmd_profile_list, cmd_profile_onboard, cmd_profile_show,
};
pub(crate) use sugar::{cmd_sugar_delete, cmd_sugar_list, cmd_sugar_log};

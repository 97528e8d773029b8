pub mod db;
pub mod diary;
pub mod gemini;
pub mod models;
pub mod planner;
pub mod prompt;
pub mod scan;

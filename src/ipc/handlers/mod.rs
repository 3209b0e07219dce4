pub mod backup_exchange;
pub mod blocks;
pub mod core;
pub mod exams;
pub mod floors;
pub mod import_structure;
pub mod rooms;
pub mod students;

//! Helpers for setting up throwaway databases and seed data in tests.

mod memory_notifier;
mod prepare_env;
mod seeds;

pub use memory_notifier::MemoryNotifier;
pub use prepare_env::{create_database, prepare_test_env, random_db_path, run_migrations};
pub use seeds::{seed_course, seed_user};

pub mod database;
pub mod stub_providers;
pub mod test_app;

pub use database::init_test_db;
pub use test_app::TestApp;

//! Integration tests against a real Postgres instance (`#[sqlx::test]`,
//! migrations from `/migrations`) plus plain unit tests for pure logic.

mod helpers;

mod inventory_store_tests;
mod models_tests;
mod order_pipeline_tests;
mod returns_tests;
mod wave_picker_tests;

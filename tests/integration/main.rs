#[path = "../common/mod.rs"]
mod common;

mod document_tests;
mod loader_tests;
mod provider_tests;

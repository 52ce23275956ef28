//! Integration tests for the editing pipeline.
//!
//! Everything runs against in-process fakes or a wiremock server:
//!   cargo test -p draftpilot-worker --test integration

mod support;

mod executor_tests;
mod pipeline_tests;
mod supervisor_tests;

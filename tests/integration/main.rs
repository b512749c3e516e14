// Integration tests

mod app_state_test;
mod lifecycle_test;
mod support;

//! Integration tests for the snapverify consistency harness

mod cli_commands;
mod logging_default;
mod scenario_run;
mod snapshot_store;
mod stress_rounds;
mod test_utils;

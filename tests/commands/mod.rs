//! Tests for the CLI commands

mod test_sample;
mod test_search;
mod test_stats;

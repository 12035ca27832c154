//! Shared test harness modules for the geodex CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod helpers;

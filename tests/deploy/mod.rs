//! Deploy step scenarios, their step definitions and fixtures.

mod bdd_steps;
mod scenarios;
mod test_helpers;

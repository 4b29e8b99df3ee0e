//! Security-header policy: the ruleset and its evaluation.

pub mod evaluate;
pub mod rules;

//! Command implementations for jobpool-cmd

pub mod run;

//! # The hlsnet scheduler
//!
//! This crate plumbs together the hlsnet crates and provides a command-line
//! interface which loads a netlist description, runs a plan of passes on it
//! and prints the scheduled netlist.
//! Libraries should depend on [`hlsnet_ir`] and [`hlsnet_opt`] instead.
pub mod cmdline;
pub mod driver;
pub mod frontend;

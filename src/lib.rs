//! Nagios-style plugin checking SQL Server database performance counters.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod mssql;
pub mod probe;
pub mod runner;
pub mod scheduler;
pub mod threshold;

//! Sync and sharing integration suite
//!
//! Runs whole devices against a simulated cloud.

#[path = "../common/mod.rs"]
mod common;

mod co_residency;
mod deletion;
mod invitations;
mod persistence;
mod restart;
mod scenarios;
mod two_devices;

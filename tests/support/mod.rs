//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod fake_network;
pub mod pack_lists;

//! Integration tests for the hexapod session.
//!
//! These tests run a full session against the simulated controller (and,
//! for the TCP case, the mock server) and check the operator-visible
//! behavior: state tracking, fault recovery, command outcomes and link loss.

mod integration;

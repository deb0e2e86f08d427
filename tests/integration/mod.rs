//! Integration Tests Module
//!
//! End-to-end tests of the planning and execution pipeline against scripted
//! text, page and snapshot collaborators.

// Scripted collaborators shared by the suites
mod mocks;

// Instruction decomposition and grounding
mod planning_test;

// Scheduling policies, retries, events and cancellation
mod execution_test;

// Configuration loading
mod settings_test;

//! Verification and patching pipeline for path-traversal vulnerabilities in
//! Node.js HTTP handlers.
//!
//! Candidate files flow through a fixed chain of steps, each owned by one
//! worker daemon: static scan, network PoC, local PoC, DoS probe, CVSS
//! scoring, and LLM-driven patch generation. SQLite is the only shared
//! state; workers coordinate purely through the `projects` table.

pub mod cli;
pub mod config;
pub mod cvss;
pub mod db;
pub mod errors;
pub mod fetch;
pub mod llm;
pub mod lock;
pub mod models;
pub mod oracle;
pub mod scan;
pub mod verifier;
pub mod workers;

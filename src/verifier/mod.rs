pub mod gateway;
pub mod outcome;

pub use gateway::{run_token, ExternalVerifier, ScriptVerifier, VerifyRequest, VerifyScript, EXIT_TIMED_OUT};
pub use outcome::{DosOutcome, LocalOutcome, NetworkOutcome, PatchVerdict, ReverifyOutcome};

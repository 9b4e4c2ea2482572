pub mod semgrep;

pub use semgrep::{ScanOutcome, SemgrepScanner, StaticScanner};

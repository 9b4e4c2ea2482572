use crate::cli::commands::StatusArgs;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::models::Step;

pub async fn handle_status(
    _args: StatusArgs,
    config_path: Option<String>,
) -> Result<(), PatrolError> {
    let settings = Settings::load(config_path.as_deref().map(std::path::Path::new))?;
    let db = Database::new(&settings.db_path)?;
    let counts = db.step_counts()?;

    println!(
        "pathpatrol {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        env!("BUILD_TIMESTAMP")
    );
    println!();
    println!("{:<18} {:>8} {:>8}", "step", "active", "paused");
    for step in Step::ALL {
        let (active, paused) = counts
            .iter()
            .find(|(s, _, _)| s == step.as_str())
            .map(|(_, a, p)| (*a, *p))
            .unwrap_or((0, 0));
        println!("{:<18} {:>8} {:>8}", step.as_str(), active, paused);
    }
    Ok(())
}

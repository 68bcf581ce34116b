use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use legaldocs::{
    auth::password,
    config::AppConfig,
    db,
    seed::{self, SeedOutcome},
};

const USAGE: &str = "Usage:\n  maintenance seed-admin <email> <password>\n  maintenance hash-password <password>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["seed-admin", email, password] => seed_admin(email, password)?,
        ["hash-password", password] => println!("{}", password::hash_password(password)?),
        [cmd, ..] => {
            eprintln!("Unknown command or arguments: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        [] => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn seed_admin(email: &str, password: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;

    let mut conn = pool.get().context("failed to get database connection")?;
    match seed::ensure_admin(&mut conn, email, password)? {
        SeedOutcome::Created(id) => println!("Admin account created: {id}"),
        SeedOutcome::Updated(id) => println!("Existing account promoted to admin: {id}"),
        SeedOutcome::Unchanged(id) => println!("Admin account already up to date: {id}"),
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

//! Seeds the database with a test account

use anyhow::Context;
use docchat_common::{auth::hash_password, config::AppConfig, db::DbPool, telemetry, Repository};
use tracing::info;

const SEED_EMAIL: &str = "test@test.com";
const SEED_PASSWORD: &str = "test";
const SEED_NAME: &str = "Test User";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let telemetry = telemetry::init_tracing(&config.observability)?;

    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;
    let repo = Repository::new(db);

    match repo.find_user_by_email(SEED_EMAIL).await? {
        Some(user) => info!(user_id = %user.id, email = SEED_EMAIL, "Seed user already exists"),
        None => {
            let user = repo
                .create_user(
                    SEED_EMAIL.to_string(),
                    hash_password(SEED_PASSWORD)?,
                    Some(SEED_NAME.to_string()),
                )
                .await?;
            info!(user_id = %user.id, email = SEED_EMAIL, "Seed user created");
        }
    }

    telemetry.shutdown();
    Ok(())
}

//! Seed (or reset) an admin account without going through the API.
//!
//! Usage: create-admin <NAME> <EMAIL> <PASSWORD>

use std::env;

use studio_cms::{auth::hash_password, db, routes::users};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [name, email, password] = args.as_slice() else {
        eprintln!("Usage: cargo run --bin create-admin <NAME> <EMAIL> <PASSWORD>");
        std::process::exit(2);
    };

    if let Err(e) = create_admin(name, email, password).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn create_admin(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let name = name.trim();
    if name.is_empty() {
        return Err("name cannot be empty".into());
    }
    let email = users::normalize_email(email)?;
    users::check_password(password)?;

    let pool = db::init_pool(None).await?;
    db::run_migrations(&pool).await?;

    let password_hash = hash_password(password.to_string()).await?;

    let (id, created): (uuid::Uuid, bool) = sqlx::query_as(
        r#"
        INSERT INTO users (name, email, password_hash, role, created_at)
        VALUES ($1, $2, $3, 'admin', now())
        ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, password_hash = EXCLUDED.password_hash, role = 'admin'
        RETURNING id, (xmax = 0) AS created
        "#,
    )
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&pool)
    .await?;

    if created {
        println!("Created admin {} <{}> ({})", name, email, id);
    } else {
        println!("Existing account <{}> reset to admin ({})", email, id);
    }

    Ok(())
}

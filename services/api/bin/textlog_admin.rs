//! Maintenance tool for the text-log table: seed sample practice sentences or
//! print the newest rows.

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rand::{Rng, seq::IndexedRandom};
use speakease_api::{db::Db, models::DEFAULT_TEXT_TYPE};
use sqlx::PgPool;

const SAMPLE_SENTENCES: &[&str] = &[
    "Can I sit with you at lunch?",
    "I did not like it when you took my pencil.",
    "What games do you like to play?",
    "Could you please say that again more slowly?",
    "I am feeling a little nervous about the test.",
    "Thank you for helping me with my project.",
    "Do you want to build a tower together?",
    "I think it is my turn now.",
];

#[derive(Parser)]
#[command(version, about = "Seed or inspect SpeakEase text logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert sample sentences at random times within the last 24 hours.
    Seed {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        session_id: String,
        #[arg(long, default_value_t = 5)]
        count: usize,
        #[arg(long, default_value = DEFAULT_TEXT_TYPE)]
        text_type: String,
    },
    /// Print the newest text logs.
    Read {
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    let cli = Cli::parse();

    let database_url =
        std::env::var("DATABASE_URL").context("Missing environment variable: DATABASE_URL")?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Db::new(pool);
    db.run_migrations().await?;

    match cli.command {
        Command::Seed {
            uid,
            session_id,
            count,
            text_type,
        } => {
            let now = Utc::now();
            let entries: Vec<_> = {
                let mut rng = rand::rng();
                (0..count)
                    .map(|_| {
                        let offset = Duration::seconds(rng.random_range(0..86_400));
                        let text = SAMPLE_SENTENCES.choose(&mut rng).copied().unwrap_or_default();
                        (now - offset, text)
                    })
                    .collect()
            };

            for (timestamp, text) in entries {
                let log = db
                    .insert_text_log_at(&uid, &session_id, timestamp, &text_type, text)
                    .await?;
                println!("inserted #{} at {}: {}", log.id, log.timestamp, log.text_content);
            }
        }
        Command::Read { limit } => {
            for log in db.get_recent_text_logs(limit.max(1)).await? {
                println!(
                    "#{} {} {}/{} [{}] {}",
                    log.id, log.timestamp, log.uid, log.session_id, log.text_type, log.text_content
                );
            }
        }
    }

    Ok(())
}

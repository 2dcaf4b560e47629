use anyhow::Result;
use std::env;
use vocab_quest::database::{sample_words, Database};
use vocab_quest::CreateWordRequest;

#[derive(Debug)]
struct SeedStats {
    total_words: u64,
    sample_words: usize,
    missing_words: usize,
    inserted_words: usize,
}

impl SeedStats {
    fn print_summary(&self, dry_run: bool) {
        println!("\n=== Seed Summary ===");
        println!("Words in database: {}", self.total_words);
        println!("Sample words available: {}", self.sample_words);

        if dry_run {
            println!("Words that WOULD BE inserted: {}", self.missing_words);
            println!("\n** DRY RUN MODE - No changes were made **");
        } else {
            println!("Words inserted: {}", self.inserted_words);
        }
    }
}

fn print_preview(word: &CreateWordRequest) {
    println!(
        "  {} [level {}] {} = {}",
        word.id, word.level, word.word, word.meaning
    );
}

async fn find_missing_words(db: &Database) -> Result<Vec<CreateWordRequest>> {
    let mut missing = Vec::new();
    for word in sample_words() {
        if db.get_word(&word.id).await?.is_none() {
            missing.push(word);
        }
    }
    Ok(missing)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let dry_run = args.contains(&"--dry-run".to_string());

    println!("=== Word Bank Seeding Tool ===");
    if dry_run {
        println!("** RUNNING IN DRY-RUN MODE **");
        println!("This will show what would be inserted without writing anything.");
    }

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:vocab_quest.db?mode=rwc".to_string());

    println!("\nConnecting to database: {}", database_url);
    let db = Database::new(&database_url).await?;

    let missing = find_missing_words(&db).await?;
    let mut stats = SeedStats {
        total_words: db.count_words().await?,
        sample_words: sample_words().len(),
        missing_words: missing.len(),
        inserted_words: 0,
    };

    if missing.is_empty() {
        println!("\n✓ Every sample word is already present.");
        stats.print_summary(dry_run);
        return Ok(());
    }

    println!("\nMissing sample words:");
    for word in &missing {
        print_preview(word);
    }

    if dry_run {
        stats.print_summary(true);
        println!("\nTo insert the words, run:");
        println!("cargo run --bin seed_words");
        return Ok(());
    }

    stats.inserted_words = db.seed_sample_words().await?;
    stats.total_words = db.count_words().await?;
    stats.print_summary(false);

    Ok(())
}

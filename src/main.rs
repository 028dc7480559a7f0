use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bankreviews::models::{
    samples_by_bank, AnalysisReport, CollectionReport, LoadReport, PreprocessReport, RawRow,
};
use bankreviews::pipeline::load_into_database;
use bankreviews::storage::files::{discover_raw_files, read_raw_rows};
use bankreviews::{
    Analyzer, BankRegistry, Collector, CollectorConfig, Config, LoaderConfig, PlayStoreClient,
    Preprocessor, Storage,
};

#[derive(Parser, Debug)]
#[command(name = "bankreviews")]
#[command(version = "0.1.0")]
#[command(about = "Collect, clean, load and analyze bank app reviews")]
#[command(after_help = "Tracked apps default to the banks' Play Store ids \
(com.combanketh.mobilebanking, com.boa.boaMobileBanking, com.dashen.dashensuperapp). \
Set CBE_APP_ID, BOA_APP_ID or DASHEN_APP_ID to track a different id; raw rows whose \
app id is not tracked are dropped as unknown_entity.")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Database path (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape reviews for every tracked bank into data/raw/
    Collect {
        /// Minimum reviews to collect per bank (overrides REVIEWS_PER_BANK)
        #[arg(short, long)]
        count: Option<u32>,

        /// Only collect these banks (code, name or configured app id)
        #[arg(short, long)]
        bank: Vec<String>,
    },

    /// Show a few raw reviews per bank
    Sample {
        /// Raw CSV files (defaults to every reviews_*.csv in data/raw/)
        inputs: Vec<PathBuf>,

        /// Reviews to show per bank
        #[arg(short, long, default_value = "3")]
        n: usize,
    },

    /// Clean raw exports into the processed dataset
    Preprocess {
        /// Raw CSV files (defaults to every reviews_*.csv in data/raw/)
        inputs: Vec<PathBuf>,

        /// Output file (defaults to data/processed/reviews_processed.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert the processed dataset into the database
    Load {
        /// Cleaned CSV (defaults to data/processed/reviews_processed.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Summarize the reviews stored in the database
    Analyze {
        /// Output format (json, text, markdown)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Keywords to list per bank
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Collect, preprocess and load in sequence
    Run {
        #[arg(short, long)]
        count: Option<u32>,

        #[arg(short, long)]
        bank: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bankreviews=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(database) = args.database.clone() {
        config.database_path = database;
    }
    let paths = config.paths();

    match args.command {
        Command::Collect { count, bank } => {
            let report = collect(&mut config, count, &bank).await?;
            println!("{}", format_collection(&report));
        }
        Command::Sample { inputs, n } => {
            let inputs = if inputs.is_empty() {
                discover_raw_files(&paths.raw_dir)?
            } else {
                inputs
            };
            let rows = readable_rows(&inputs)?;
            println!("{}", format_samples(&rows, n));
        }
        Command::Preprocess { inputs, output } => {
            let inputs = if inputs.is_empty() {
                discover_raw_files(&paths.raw_dir)?
            } else {
                inputs
            };
            let output = output.unwrap_or_else(|| paths.processed_reviews());
            let preprocessor = Preprocessor::new(&config.apps);
            let (_, report) = preprocessor.process_files(&inputs, &output)?;
            println!("{}", format_preprocess(&report));
        }
        Command::Load { input } => {
            let input = input.unwrap_or_else(|| paths.processed_reviews());
            let report = load_into_database(
                &config.database_path,
                &input,
                &config.apps,
                LoaderConfig::from(&config),
            )?;
            println!("{}", format_load(&report));
        }
        Command::Analyze { format, output, top } => {
            let storage = Storage::new(&config.database_path)?;
            let report = Analyzer::new(&storage).with_top_keywords(top).analyze()?;
            output_analysis(&report, &format, output.as_deref())?;
        }
        Command::Run { count, bank } => {
            let collected = collect(&mut config, count, &bank).await?;
            println!("{}", format_collection(&collected));

            let inputs = discover_raw_files(&paths.raw_dir)?;
            println!("{}", format_samples(&readable_rows(&inputs)?, 3));

            let (_, preprocessed) =
                Preprocessor::new(&config.apps).process_files(&inputs, &paths.processed_reviews())?;
            println!("{}", format_preprocess(&preprocessed));

            let loaded = load_into_database(
                &config.database_path,
                &paths.processed_reviews(),
                &config.apps,
                LoaderConfig::from(&config),
            )?;
            println!("{}", format_load(&loaded));
        }
    }

    Ok(())
}

async fn collect(
    config: &mut Config,
    count: Option<u32>,
    banks: &[String],
) -> anyhow::Result<CollectionReport> {
    if let Some(count) = count {
        config.reviews_per_bank = count;
        config.validate()?;
    }

    let apps = BankRegistry::new(&config.apps).select(banks)?;

    let paths = config.paths();
    paths.ensure_dirs()?;

    let client = PlayStoreClient::new(&config.lang, &config.country)?;
    let collector = Collector::new(client, paths, CollectorConfig::from(&*config));

    tracing::info!(
        "Starting collection: {} apps, {} reviews each",
        apps.len(),
        config.reviews_per_bank
    );
    Ok(collector.collect_all(&apps).await?)
}

fn readable_rows(inputs: &[PathBuf]) -> anyhow::Result<Vec<RawRow>> {
    Ok(read_raw_rows(inputs)?.into_iter().filter_map(|r| r.ok()).collect())
}

fn format_collection(report: &CollectionReport) -> String {
    let mut output = String::new();

    if !report.app_info.is_empty() {
        output.push_str("\n=== App Info ===\n\n");
        for info in &report.app_info {
            output.push_str(&format!("  {} ({})\n", info.bank_name, info.title));
            output.push_str(&format!(
                "    Rating: {}  Ratings: {}  Reviews: {}  Installs: {}\n",
                info.score
                    .map(|s| format!("{:.2}", s))
                    .unwrap_or_else(|| "-".to_string()),
                info.ratings,
                info.reviews,
                info.installs.as_deref().unwrap_or("-")
            ));
        }
    }

    output.push_str("\n=== Collection ===\n\n");
    for app in &report.apps {
        let bank = app
            .bank_code
            .map(|c| c.bank_name().to_string())
            .unwrap_or_else(|| app.app_id.clone());
        output.push_str(&format!("  {}: {} / {}", bank, app.collected, app.target));
        if app.shortfall() > 0 {
            output.push_str(&format!(" (short by {}, source exhausted)", app.shortfall()));
        }
        output.push('\n');
    }
    output.push_str(&format!("\nTotal reviews collected: {}\n", report.total_collected()));

    output
}

fn format_preprocess(report: &PreprocessReport) -> String {
    let mut output = String::new();

    output.push_str("\n=== Preprocessing Report ===\n\n");
    output.push_str(&format!("Original records: {}\n", report.input_rows));

    let missing: Vec<_> = report
        .missing_by_column
        .iter()
        .filter(|(_, count)| **count > 0)
        .collect();
    if !missing.is_empty() && report.input_rows > 0 {
        output.push_str("\nMissing values:\n");
        for (column, count) in missing {
            let pct = *count as f64 / report.input_rows as f64 * 100.0;
            output.push_str(&format!("  {}: {} ({:.2}%)\n", column, count, pct));
        }
        output.push('\n');
    }

    for (reason, count) in &report.dropped {
        output.push_str(&format!("Dropped ({}): {}\n", reason, count));
    }
    output.push_str(&format!("Final records: {}\n", report.output_rows));
    output.push_str(&format!(
        "Data retention rate: {:.2}%\n",
        report.retention_rate()
    ));

    if !report.per_bank.is_empty() {
        output.push_str("\nReviews per bank:\n");
        for (bank, count) in &report.per_bank {
            output.push_str(&format!("  {}: {}\n", bank.bank_name(), count));
        }
    }

    if report.output_rows > 0 {
        output.push_str("\nRating distribution:\n");
        for (rating, count) in report.rating_distribution.iter().rev() {
            let pct = *count as f64 / report.output_rows as f64 * 100.0;
            output.push_str(&format!(
                "  {}: {} ({:.1}%)\n",
                "*".repeat(*rating as usize),
                count,
                pct
            ));
        }
        output.push_str(&format!(
            "\nText length: avg={:.0}, median={:.0}\n",
            report.mean_text_length, report.median_text_length
        ));
    }

    if let Some(ref path) = report.output_path {
        output.push_str(&format!("\nSaved to: {}\n", path));
    }

    output
}

fn format_samples(rows: &[RawRow], per_bank: usize) -> String {
    let mut output = String::new();

    output.push_str("\n=== Sample Reviews ===\n");
    for (bank, samples) in samples_by_bank(rows, per_bank) {
        output.push_str(&format!("\n{}:\n", bank));
        for row in samples {
            let stars = row
                .rating
                .as_deref()
                .and_then(|r| r.trim().parse::<f64>().ok())
                .map(|r| "*".repeat(r.clamp(0.0, 5.0) as usize))
                .unwrap_or_else(|| "?".to_string());
            let text: String = row
                .review_text
                .as_deref()
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            output.push_str(&format!(
                "  {} {}\n    {}\n",
                stars,
                row.review_date.as_deref().unwrap_or("-"),
                text
            ));
        }
    }

    output
}

fn format_load(report: &LoadReport) -> String {
    let mut output = String::new();

    output.push_str("\n=== Load Report ===\n\n");
    output.push_str(&format!("Attempted: {}\n", report.attempted));
    output.push_str(&format!("Inserted: {}\n", report.inserted));
    output.push_str(&format!("Failed: {}\n", report.failed));
    if report.skipped_existing > 0 {
        output.push_str(&format!("Already loaded: {}\n", report.skipped_existing));
    }
    output.push_str(&format!(
        "Success rate: {:.2}%\n",
        report.success_rate() * 100.0
    ));

    output
}

fn output_analysis(report: &AnalysisReport, format: &str, path: Option<&str>) -> anyhow::Result<()> {
    let output = match format {
        "json" => serde_json::to_string_pretty(report)?,
        "markdown" => format_markdown(report),
        _ => format_text(report),
    };

    if let Some(path) = path {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n=== Review Analysis: {} reviews ===\n",
        report.total_reviews
    ));

    for bank in &report.banks {
        output.push_str(&format!("\n{}\n", bank.bank_name));
        output.push_str(&format!("  Reviews: {}\n", bank.review_count));
        output.push_str(&format!("  Average rating: {:.2}\n", bank.average_rating));

        output.push_str("  Ratings:\n");
        for rating in (1..=5).rev() {
            output.push_str(&format!(
                "    {:<5} {:>5.1}%\n",
                "*".repeat(rating as usize),
                bank.rating_share(rating)
            ));
        }

        if !bank.sentiment_counts.is_empty() {
            let labels: Vec<_> = bank
                .sentiment_counts
                .iter()
                .map(|(label, count)| format!("{}={}", label, count))
                .collect();
            output.push_str(&format!("  Sentiment: {}\n", labels.join(", ")));
        }
        if let Some(avg) = bank.average_sentiment {
            output.push_str(&format!("  Average sentiment score: {:.3}\n", avg));
        }

        if !bank.top_keywords.is_empty() {
            let words: Vec<_> = bank
                .top_keywords
                .iter()
                .map(|k| format!("{} ({})", k.word, k.count))
                .collect();
            output.push_str(&format!("  Top keywords: {}\n", words.join(", ")));
        }
    }

    if !report.monthly.is_empty() {
        output.push_str("\nMonthly volume:\n");
        for month in &report.monthly {
            output.push_str(&format!(
                "  {}: {} reviews, avg {:.2}\n",
                month.month, month.review_count, month.average_rating
            ));
        }
    }

    output
}

fn format_markdown(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Bank Review Analysis\n\n");
    output.push_str(&format!("**Total reviews:** {}\n\n", report.total_reviews));

    output.push_str("## Summary\n\n");
    output.push_str("| Bank | Reviews | Avg Rating | 5★ | 1★ | Avg Sentiment |\n");
    output.push_str("|------|---------|------------|----|----|---------------|\n");
    for bank in &report.banks {
        output.push_str(&format!(
            "| {} | {} | {:.2} | {:.1}% | {:.1}% | {} |\n",
            bank.bank_name,
            bank.review_count,
            bank.average_rating,
            bank.rating_share(5),
            bank.rating_share(1),
            bank.average_sentiment
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "-".to_string())
        ));
    }

    for bank in &report.banks {
        if bank.top_keywords.is_empty() {
            continue;
        }
        output.push_str(&format!("\n## {}: Top Keywords\n\n", bank.bank_name));
        output.push_str("| Keyword | Count |\n|---------|-------|\n");
        for keyword in &bank.top_keywords {
            output.push_str(&format!("| {} | {} |\n", keyword.word, keyword.count));
        }
    }

    if !report.monthly.is_empty() {
        output.push_str("\n## Monthly Volume\n\n");
        output.push_str("| Month | Reviews | Avg Rating |\n|-------|---------|------------|\n");
        for month in &report.monthly {
            output.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                month.month, month.review_count, month.average_rating
            ));
        }
    }

    output
}

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobtrail_adapters::{MailboxExport, MessageSource};
use jobtrail_core::{ContactRecord, ContactStamp, DateWindow, MessageItem};
use jobtrail_ingest::{replay_window, review_items, OperatorConsole};
use jobtrail_storage::export::{
    format_row, normalize_colsep, read_statement, run_statement, CsvOptions, StatementOutcome,
};
use jobtrail_storage::ContactStore;
use tracing_subscriber::EnvFilter;

const SEPARATOR: &str =
    "------------------------------------------------------------------------------------------------------------";

#[derive(Debug, Parser)]
#[command(name = "jobtrail")]
#[command(about = "Interactive, deduplicating job-contact ingestion")]
struct Cli {
    /// Path to the contacts database.
    #[arg(long, default_value = "jobtrail.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Review inbox messages in a date window and load accepted contacts.
    Load {
        /// Window start, `MM/DD/YYYY HH:MM`. Prompted for when omitted.
        start: Option<String>,
        /// Window end, `MM/DD/YYYY HH:MM`. Prompted for when omitted.
        end: Option<String>,
        /// Mailbox export file (JSON array of messages).
        #[arg(long)]
        mailbox: PathBuf,
    },
    /// Replay stored contacts in a date window, newest first.
    Report {
        start: String,
        end: String,
    },
    /// Execute one SQL statement against the store and emit rows as CSV.
    Exec {
        /// Column separator; `\t` means a literal tab.
        #[arg(long, default_value = ",")]
        colsep: String,
        /// Quote character around column values; empty disables quoting.
        #[arg(long, default_value = "\"")]
        quote: String,
        /// SQL input file; statement is read from stdin when omitted.
        #[arg(long)]
        infile: Option<PathBuf>,
        /// Output file; rows go to stdout when omitted.
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Load {
            start,
            end,
            mailbox,
        } => run_load(&cli.db, start, end, &mailbox).await,
        Commands::Report { start, end } => run_report(&cli.db, &start, &end).await,
        Commands::Exec {
            colsep,
            quote,
            infile,
            outfile,
        } => run_exec(&cli.db, &colsep, &quote, infile, outfile).await,
    }
}

async fn run_load(
    db: &PathBuf,
    start: Option<String>,
    end: Option<String>,
    mailbox: &PathBuf,
) -> Result<()> {
    let start = match start {
        Some(text) => text,
        None => prompt_line("Enter Start Date \"mm/dd/yyyy hh:mm\": ")?,
    };
    let end = match end {
        Some(text) => text,
        None => prompt_line("Enter End Date \"mm/dd/yyyy hh:mm\": ")?,
    };
    let window = parse_window(&start, &end)?;

    let store = ContactStore::open(db)
        .await
        .with_context(|| format!("opening store {}", db.display()))?;
    let source = MailboxExport::new(mailbox);
    let items = source.list_items(&window).await?;

    let mut console = StdioConsole;
    let mut session = store.begin_session().await?;
    let summary = review_items(&mut session, &mut console, &items).await?;
    // Quit stops the review, not the commit: everything loaded before the
    // quit still lands in this session's single transaction.
    session.commit().await?;

    println!("{} contact records loaded", summary.attempted_loads);

    let answer = prompt_line("Review loaded contacts in this window? (y/n): ")?;
    if answer.trim().eq_ignore_ascii_case("y") {
        println!("{SEPARATOR}");
        replay_window(&store, &mut console, &window).await?;
    }
    Ok(())
}

async fn run_report(db: &PathBuf, start: &str, end: &str) -> Result<()> {
    let window = parse_window(start, end)?;
    let store = ContactStore::open(db)
        .await
        .with_context(|| format!("opening store {}", db.display()))?;
    let mut console = StdioConsole;
    println!("{SEPARATOR}");
    let shown = replay_window(&store, &mut console, &window).await?;
    println!("{shown} contact records shown");
    Ok(())
}

async fn run_exec(
    db: &PathBuf,
    colsep: &str,
    quote: &str,
    infile: Option<PathBuf>,
    outfile: Option<PathBuf>,
) -> Result<()> {
    let sql = match infile {
        Some(path) => {
            let file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            read_statement(file).with_context(|| format!("reading {}", path.display()))?
        }
        None => read_statement(io::stdin()).context("reading statement from stdin")?,
    };

    let store = ContactStore::open(db)
        .await
        .with_context(|| format!("opening store {}", db.display()))?;
    let outcome = run_statement(store.pool(), &sql).await?;

    let mut out: Box<dyn Write> = match outfile {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };

    let options = CsvOptions {
        quote: quote.to_string(),
        colsep: normalize_colsep(colsep),
    };
    match outcome {
        StatementOutcome::Rows(rows) => {
            for row in &rows {
                writeln!(out, "{}", format_row(row, &options))?;
            }
        }
        StatementOutcome::Affected(count) => {
            writeln!(out, "Statement executed.")?;
            writeln!(out, "Rows affected: {count}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_window(start: &str, end: &str) -> Result<DateWindow> {
    let start = ContactStamp::parse(start)?;
    let end = ContactStamp::parse(end)?;
    Ok(DateWindow::new(start, end)?)
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("reading operator input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Console over stdin/stdout matching the original tool's presentation.
struct StdioConsole;

impl OperatorConsole for StdioConsole {
    fn prompt_decision(&mut self, item: &MessageItem) -> Result<String> {
        println!("{SEPARATOR}");
        println!(
            "{} | {} | {}",
            item.received_at, item.sender_address, item.subject
        );
        println!("{SEPARATOR}");
        prompt_line("(l)oad, (s)kip, or (q)uit: ")
    }

    fn prompt_next(&mut self, record: &ContactRecord) -> Result<String> {
        println!("{} - {}", record.date_of_contact, record.sender_address);
        println!();
        println!("{}", record.subject);
        println!();
        println!("{}", record.body);
        println!("{SEPARATOR}");
        prompt_line("")
    }
}

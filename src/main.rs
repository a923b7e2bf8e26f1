use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wordsource::buffers::Buffers;
use wordsource::chars::Chars;
use wordsource::config::Config;
use wordsource::engine::Engine;
use wordsource::keywords::{KeywordsBuffer, TokenizeOptions};
use wordsource::path::{PathResolver, PathStyle};
use wordsource::protocol::CompleteOption;

#[derive(Parser)]
#[command(name = "wordsource", about = "Keyword, path and word-list completion")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log to file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Complete the word before the cursor from the given buffers
    Complete {
        /// Files indexed as buffers; the first one is the current buffer
        files: Vec<PathBuf>,

        /// Text of the cursor line
        #[arg(short, long)]
        line: String,

        /// Byte column of the cursor (defaults to the end of the line)
        #[arg(long)]
        col: Option<usize>,

        /// Zero-based line number of the cursor in the current buffer
        #[arg(long, default_value_t = 0)]
        linenr: usize,

        /// Path of the file being edited
        #[arg(long)]
        filepath: Option<PathBuf>,

        /// Working directory for path completion
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the keyword tokens of a file in index order
    Words {
        file: PathBuf,

        /// Keyword character rule, e.g. "@,48-57,_,192-255"
        #[arg(long)]
        iskeyword: Option<String>,
    },
    /// Resolve the directory a path fragment completes in
    Root {
        fragment: String,

        /// Nearest ancestor containing this entry becomes the base
        #[arg(long)]
        hint: Option<String>,

        #[arg(long)]
        filepath: Option<String>,

        #[arg(long)]
        cwd: Option<String>,

        /// Use drive-letter path rules
        #[arg(long)]
        drive_letter: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Complete {
            files,
            line,
            col,
            linenr,
            filepath,
            cwd,
            json,
        } => {
            let cwd = match cwd {
                Some(cwd) => cwd,
                None => std::env::current_dir().context("Failed to read working directory")?,
            };
            complete(&config, files, line, col, linenr, filepath, cwd, json).await?;
        }
        Commands::Words { file, iskeyword } => {
            print_words(&config, &file, iskeyword.as_deref()).await?;
        }
        Commands::Root {
            fragment,
            hint,
            filepath,
            cwd,
            drive_letter,
        } => {
            let cwd = match cwd {
                Some(cwd) => cwd,
                None => std::env::current_dir()
                    .context("Failed to read working directory")?
                    .to_string_lossy()
                    .into_owned(),
            };
            let style = PathStyle::from_drive_letter(drive_letter || config.file.drive_letter);
            let hint = hint.or_else(|| config.file.root_hint.clone());
            let resolver = PathResolver::from_process_env(style);
            match resolver.get_root(&fragment, hint.as_deref(), filepath.as_deref(), &cwd) {
                Some(root) => println!("{}", root.display()),
                None => anyhow::bail!("No completion root for '{fragment}'"),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(text.lines().map(String::from).collect())
}

#[allow(clippy::too_many_arguments)]
async fn complete(
    config: &Config,
    files: Vec<PathBuf>,
    line: String,
    col: Option<usize>,
    linenr: usize,
    filepath: Option<PathBuf>,
    cwd: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let buffers = Buffers::new(config.keywords.clone());
    for (idx, file) in files.iter().enumerate() {
        buffers.attach(idx as u64 + 1, read_lines(file).await?, &[]).await;
    }
    let engine = Engine::from_config(config, buffers).await;

    let chars = Chars::with_extra(&config.keywords.iskeyword, &config.keywords.extra_chars);
    let col = col.unwrap_or(line.len());
    let mut opt = CompleteOption::from_cursor(1, line, linenr, col, &chars).with_cwd(cwd);
    if let Some(filepath) = filepath.or_else(|| files.first().cloned()) {
        opt = opt.with_filepath(filepath);
    }

    let token = CancellationToken::new();
    let Some(result) = engine.complete(&opt, &token).await else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for item in &result.items {
            println!(
                "{}\t{}",
                item.abbr.as_deref().unwrap_or(&item.word),
                item.menu.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn print_words(config: &Config, file: &Path, iskeyword: Option<&str>) -> anyhow::Result<()> {
    let iskeyword = iskeyword.unwrap_or(&config.keywords.iskeyword);
    let chars = Chars::with_extra(iskeyword, &config.keywords.extra_chars);
    let options = TokenizeOptions {
        min_length: config.keywords.min_length,
        max_line_length: config.keywords.max_line_length,
    };
    let mut buffer = KeywordsBuffer::new(chars, options);
    buffer.set_lines(read_lines(file).await?);
    for word in buffer.get_words() {
        println!("{word}");
    }
    Ok(())
}

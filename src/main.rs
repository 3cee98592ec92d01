//! rfcview - navigate RFCs kept as paginated plain text.
//!
//! # Usage
//!
//! ```bash
//! rfcview open rfc:2223#section-3.2
//! rfcview page rfc791.txt 4
//! rfcview next-page rfc791.txt --line 120
//! rfcview --cache-dir ~/rfc --save
//! ```

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rfcview::cache::{DocumentCache, HttpFetcher, SkipReason};
use rfcview::commands::{self, Command, CommandOutcome};
use rfcview::config::{
    ConfigFlags, Settings, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use rfcview::document::{
    DocumentHost, DocumentId, Editor, Point, Selection, TextEditor, Workspace, is_rfc_document,
};
use rfcview::pages::{FORM_FEED, PageIndex};
use rfcview::paths::PathResolver;

/// Navigate RFCs kept as paginated plain text
#[derive(Parser, Debug)]
#[command(name = "rfcview", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    action: Option<Action>,

    /// Directory holding rfc<N>.txt files (`~` and `~user` are expanded)
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<String>,

    /// Download RFCs missing from the cache
    #[arg(long, global = true, overrides_with = "no_download")]
    download: bool,

    /// Never download; only open cached RFCs
    #[arg(long, global = true)]
    no_download: bool,

    /// Download URL; every `#` is replaced with the RFC number
    #[arg(long, global = true, value_name = "URL")]
    download_source: Option<String>,

    /// Rows shown around the landing position
    #[arg(long, global = true, value_name = "N")]
    rows: Option<u16>,

    /// Save current command-line flags as defaults
    #[arg(long, global = true)]
    save: bool,

    /// Clear saved defaults
    #[arg(long, global = true)]
    clear: bool,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open an RFC by number or `rfc:` URI; prompts when omitted
    Open {
        #[arg(value_name = "ADDRESS")]
        address: Option<String>,
    },
    /// Jump to a page of a local file; prompts when omitted
    Page {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "N", allow_negative_numbers = true)]
        page: Option<i64>,
    },
    /// Move from a line to the next page boundary
    NextPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// One-based starting line
        #[arg(long, default_value_t = 1)]
        line: usize,
    },
    /// Move from a line to the start of its page
    PrevPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// One-based starting line
        #[arg(long, default_value_t = 1)]
        line: usize,
    },
    /// Print a path with `~` expanded
    Path {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
        eprintln!("Saved defaults to {}", global_path.display());
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let settings = Settings::from_flags(&file_flags.union(&cli_flags));
    tracing::debug!(?settings, "effective settings");

    let Some(action) = cli.action else {
        return Ok(());
    };

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let cache = DocumentCache::new(PathResolver::system(), fetcher).with_settings(&settings);
    let mut workspace = Workspace::new().with_rows(settings.rows);
    let mut prompt = stdin_prompt;

    let outcome = match action {
        Action::Open { address } => {
            commands::dispatch(Command::OpenRfc(address), &mut workspace, &cache, &mut prompt)
        }
        Action::Page { file, page } => {
            open_local(&mut workspace, &file)?;
            commands::dispatch(Command::GoToPage(page), &mut workspace, &cache, &mut prompt)
        }
        Action::NextPage { file, line } => {
            start_at(&mut workspace, &file, line)?;
            commands::dispatch(Command::NextPage, &mut workspace, &cache, &mut prompt)
        }
        Action::PrevPage { file, line } => {
            start_at(&mut workspace, &file, line)?;
            commands::dispatch(Command::PrevPage, &mut workspace, &cache, &mut prompt)
        }
        Action::Path { path } => {
            println!("{}", cache.resolver().expand_path(&path));
            return Ok(());
        }
    };

    match outcome {
        CommandOutcome::Moved(_) => {
            if let Some(id) = workspace.active() {
                report(&workspace, id);
            }
        }
        CommandOutcome::Opened(id, _) => report(&workspace, id),
        CommandOutcome::Skipped(SkipReason::NotConfigured) => {
            anyhow::bail!("No cache directory configured (use --cache-dir)");
        }
        CommandOutcome::Skipped(SkipReason::DownloadDisabled) => {
            anyhow::bail!("RFC is not cached and downloads are disabled");
        }
        CommandOutcome::Failed => {
            for note in workspace.notifications() {
                eprintln!("{}: {}", note.message, note.detail);
            }
            std::process::exit(1);
        }
        CommandOutcome::Ignored => eprintln!("Nothing to do"),
    }
    Ok(())
}

fn stdin_prompt(message: &str) -> Option<String> {
    eprint!("{message}: ");
    io::stderr().flush().ok()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end().to_string()),
    }
}

fn open_local(workspace: &mut Workspace, file: &Path) -> Result<DocumentId> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    let id = workspace.open(file)?;
    if let Some(editor) = workspace.editor(id)
        && !is_rfc_document(editor.path(), &editor.text())
    {
        tracing::warn!(path = %file.display(), "file does not look like an RFC");
    }
    Ok(id)
}

fn start_at(workspace: &mut Workspace, file: &Path, line: usize) -> Result<()> {
    let id = open_local(workspace, file)?;
    if let Some(editor) = workspace.editor_mut(id) {
        let start = Point::new(line.saturating_sub(1), 0);
        editor.set_selection(Selection::at(start));
    }
    Ok(())
}

fn report(workspace: &Workspace, id: DocumentId) {
    let Some(editor) = workspace.editor(id) else {
        return;
    };
    print!("{}", render(editor));
}

fn render(editor: &TextEditor) -> String {
    let cursor = editor.selection().start;
    let index = PageIndex::scan(editor);
    let name = editor
        .path()
        .map_or_else(|| "<buffer>".to_string(), |p| p.display().to_string());

    let mut out = format!(
        "{name}:{}:{} (page {} of {})\n",
        cursor.row + 1,
        cursor.column + 1,
        index.page_of_row(cursor.row),
        index.page_count()
    );
    let width = editor.line_count().to_string().len();
    for (row, line) in editor.visible_lines() {
        let marker = if editor.selection().start.row <= row && row <= editor.selection().end.row {
            '>'
        } else {
            ' '
        };
        let line = line.replace(FORM_FEED, "^L");
        out.push_str(&format!("{marker}{:>width$} {line}\n", row + 1));
    }
    out
}

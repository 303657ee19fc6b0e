// prompt-keeper - a prompt library you can search while you type
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use anyhow::{anyhow, bail, Context};
use prompt_keeper_lib::{
    core::{sorter, Column, Direction, SortState},
    db::{display_timestamp, tag_query, tags_from_input, Record, RecordFields, RecordSummary, ResultSet},
    intelligence::{suggest_tags, TextStats},
    logging, KeeperError, PromptLibrary, Settings,
};
use std::env;
use std::io::Read;
use std::path::PathBuf;

const CONFIG_ENV: &str = "PROMPT_KEEPER_CONFIG";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if let Err(err) = run(&args).await {
        // Library errors have a friendlier wording than their Display
        match err.downcast_ref::<KeeperError>() {
            Some(keeper) => eprintln!("Error: {}", keeper.user_message()),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "version" | "-v" | "--version" => {
            println!("prompt-keeper v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "help" | "-h" | "--help" => {
            print_usage();
            return Ok(());
        }
        // Pure text helpers, no store needed
        "analyze" => return handle_analyze(rest),
        _ => {}
    }

    let settings = load_settings()?;
    logging::init(&settings.logging)?;

    let library = PromptLibrary::open(&settings)
        .await
        .with_context(|| format!("opening {}", settings.database.path.display()))?;

    let result = match command {
        "add" => handle_add(&library, rest).await,
        "show" => handle_show(&library, rest).await,
        "edit" => handle_edit(&library, rest).await,
        "copy" => handle_copy(&library, rest).await,
        "delete" => handle_delete(&library, rest).await,
        "search" => handle_search(&library, rest).await,
        "tag" => handle_tag(&library, rest).await,
        "list" => handle_list(&library, rest).await,
        "reindex" => handle_reindex(&library).await,
        "verify" => handle_verify(&library).await,
        "stats" => handle_stats(&library).await,
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            Ok(())
        }
    };

    library.close().await;
    result
}

fn load_settings() -> anyhow::Result<Settings> {
    let path = match env::var_os(CONFIG_ENV) {
        Some(path) => PathBuf::from(path),
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("could not find a config directory; set {}", CONFIG_ENV))?
            .join("prompt-keeper")
            .join("settings.toml"),
    };

    Settings::load_or_default(&path).with_context(|| format!("loading {}", path.display()))
}

/// Flags shared by `add` and `edit`. `None` means "leave alone".
#[derive(Default)]
struct FieldArgs {
    purpose: Option<String>,
    body: Option<String>,
    urls: Option<String>,
    tags: Option<String>,
    note: Option<String>,
}

impl FieldArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = FieldArgs::default();
        let mut loose = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let slot = match args[i].as_str() {
                "--purpose" => &mut parsed.purpose,
                "--body" => &mut parsed.body,
                "--urls" => &mut parsed.urls,
                "--tags" => &mut parsed.tags,
                "--note" => &mut parsed.note,
                arg => {
                    loose.push(arg.to_string());
                    i += 1;
                    continue;
                }
            };
            i += 1;
            let value = args
                .get(i)
                .ok_or_else(|| anyhow!("{} needs a value", args[i - 1]))?;
            *slot = Some(value.clone());
            i += 1;
        }

        // Bare words are the body, e.g. `add summarize this article`
        if parsed.body.is_none() && !loose.is_empty() {
            parsed.body = Some(loose.join(" "));
        }

        // `--body -` reads the body from stdin
        if parsed.body.as_deref() == Some("-") {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            parsed.body = Some(body);
        }

        Ok(parsed)
    }

    fn is_empty(&self) -> bool {
        self.purpose.is_none()
            && self.body.is_none()
            && self.urls.is_none()
            && self.tags.is_none()
            && self.note.is_none()
    }

    /// Overlay the given flags onto existing fields
    fn apply(self, mut fields: RecordFields) -> anyhow::Result<RecordFields> {
        if let Some(purpose) = self.purpose {
            fields.purpose = Some(purpose);
        }
        if let Some(body) = self.body {
            fields.body = Some(body);
        }
        if let Some(urls) = self.urls {
            fields.urls = Some(urls);
        }
        if let Some(tags) = self.tags {
            fields.tags = tags_from_input(&tags)?;
        }
        if let Some(note) = self.note {
            fields.note = Some(note);
        }
        Ok(fields)
    }
}

fn parse_id(args: &[String]) -> anyhow::Result<i64> {
    let raw = args.first().ok_or_else(|| anyhow!("missing prompt id"))?;
    raw.parse()
        .with_context(|| format!("'{}' is not a prompt id", raw))
}

/// `--sort purpose` or `--sort modified:desc`, pulled out of the args
fn split_sort(args: &[String]) -> anyhow::Result<(Vec<String>, SortState)> {
    let mut rest = Vec::new();
    let mut sort = SortState::unsorted();

    let mut i = 0;
    while i < args.len() {
        if args[i] == "--sort" {
            i += 1;
            let spec = args.get(i).ok_or_else(|| anyhow!("--sort needs a column"))?;
            let (column, direction) = match spec.split_once(':') {
                Some((column, "desc")) => (column, Direction::Descending),
                Some((column, "asc")) => (column, Direction::Ascending),
                Some((_, other)) => bail!("unknown sort direction: {}", other),
                None => (spec.as_str(), Direction::Ascending),
            };
            let column: Column = column.parse().map_err(|e: String| anyhow!(e))?;
            sort = SortState::by(column, direction);
        } else {
            rest.push(args[i].clone());
        }
        i += 1;
    }

    Ok((rest, sort))
}

async fn handle_add(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let flags = FieldArgs::parse(args)?;
    if flags.is_empty() {
        bail!("nothing to save; pass a body or --purpose/--body/--urls/--tags/--note");
    }

    let fields = flags.apply(RecordFields::default())?;
    let id = library.create(&fields).await?;
    println!("Saved prompt #{}", id);
    Ok(())
}

async fn handle_show(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args)?;
    let record = library.get_or_fetch(id).await?;
    print_record(&record);
    Ok(())
}

async fn handle_edit(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args)?;
    let flags = FieldArgs::parse(&args[1..])?;
    if flags.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let current = library.read(id).await?;
    let fields = flags.apply(current.fields())?;
    library.update(id, &fields).await?;
    println!("Updated prompt #{}", id);
    Ok(())
}

async fn handle_copy(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args)?;
    let copy = library.duplicate(id).await?;
    println!("Copied prompt #{} to #{}", id, copy);
    Ok(())
}

async fn handle_delete(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        bail!("missing prompt id");
    }

    let ids = args
        .iter()
        .map(|raw| {
            raw.parse::<i64>()
                .with_context(|| format!("'{}' is not a prompt id", raw))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let count = library.delete_many(&ids).await?;
    println!("Deleted {} prompt(s)", count);
    Ok(())
}

async fn handle_search(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let (words, sort) = split_sort(args)?;
    let term = words.join(" ");

    let ticket = library.search_sorted(&term, sort);
    let shown = ticket.term().to_string();
    let results = ticket.wait().await?;
    print_results(&results, &sort, &shown);
    Ok(())
}

async fn handle_tag(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let (words, sort) = split_sort(args)?;
    let tag = words.join(" ");
    if tag.trim().is_empty() {
        bail!("missing tag");
    }

    let term = tag_query(&tag);
    let results = library.search_sorted(&term, sort).wait().await?;
    print_results(&results, &sort, &term);
    Ok(())
}

async fn handle_list(library: &PromptLibrary, args: &[String]) -> anyhow::Result<()> {
    let (_, sort) = split_sort(args)?;

    let rows: Vec<RecordSummary> = library
        .list_all()
        .await?
        .iter()
        .map(Record::summary)
        .collect();
    let results = ResultSet::new(sorter::apply(&rows, &sort));
    print_results(&results, &sort, "");
    Ok(())
}

async fn handle_reindex(library: &PromptLibrary) -> anyhow::Result<()> {
    let count = library.reindex_all().await?;
    println!("Rebuilt the search index from {} prompt(s)", count);
    Ok(())
}

async fn handle_verify(library: &PromptLibrary) -> anyhow::Result<()> {
    let health = library.verify_index().await?;
    if health.is_consistent() {
        println!("Search index is consistent.");
    } else {
        println!(
            "Search index is out of date: {} missing, {} orphaned.",
            health.missing.len(),
            health.orphaned.len()
        );
        println!("Run 'prompt-keeper reindex' to rebuild it.");
    }
    Ok(())
}

async fn handle_stats(library: &PromptLibrary) -> anyhow::Result<()> {
    let stats = library.stats().await?;

    println!("\nprompt-keeper Status");
    println!("{}", "=".repeat(60));
    println!("  Database:  {}", library.database().path().display());
    println!("  Prompts:   {}", stats.records);
    println!("  Indexed:   {}", stats.indexed);
    println!("  Cached:    {}/{}", stats.cached, stats.cache_capacity);
    println!(
        "  Pool:      {} connection(s), {} idle",
        stats.connections, stats.idle_connections
    );
    println!("{}", "=".repeat(60));
    Ok(())
}

fn handle_analyze(args: &[String]) -> anyhow::Result<()> {
    let text = if args.is_empty() || args[0] == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        args.join(" ")
    };

    println!("{}", TextStats::compute(&text).status_line());

    let tags = suggest_tags(&text);
    if !tags.is_empty() {
        println!("Suggested tags: {}", tags.join(", "));
    }
    Ok(())
}

fn print_record(record: &Record) {
    println!("\nPrompt #{}", record.id);
    println!("{}", "=".repeat(60));
    println!("Created:  {}", display_timestamp(&record.created));
    println!("Modified: {}", display_timestamp(&record.modified));
    println!("Purpose:  {}", record.purpose.as_deref().unwrap_or(""));
    println!("Tags:     {}", record.parsed_tags().summary());
    if let Some(urls) = record.urls.as_deref().filter(|u| !u.is_empty()) {
        println!("URLs:     {}", urls);
    }
    println!("{}", "-".repeat(60));
    let body = record.body.as_deref().unwrap_or("");
    println!("{}", body);
    if let Some(note) = record.note.as_deref().filter(|n| !n.is_empty()) {
        println!("{}", "-".repeat(60));
        println!("Note: {}", note);
    }
    println!("{}", "=".repeat(60));
    println!("{}", TextStats::compute(body).status_line());
}

fn print_results(results: &ResultSet, sort: &SortState, term: &str) {
    if results.recovered {
        println!("Note: the search index was out of date and has been rebuilt.");
    }

    if results.is_empty() {
        if term.trim().is_empty() {
            println!("No prompts saved yet.");
        } else {
            println!("No prompts found matching '{}'", term);
        }
        return;
    }

    println!(
        "\n{:>6}  {:<19}  {:<19}  {:<30}  {}",
        sort.header_label(Column::Id),
        sort.header_label(Column::Created),
        sort.header_label(Column::Modified),
        sort.header_label(Column::Purpose),
        sort.header_label(Column::Tags)
    );
    println!("{}", "=".repeat(100));
    for row in &results.rows {
        println!(
            "{:>6}  {:<19}  {:<19}  {:<30}  {}",
            row.id,
            display_timestamp(&row.created),
            display_timestamp(&row.modified),
            truncate(row.purpose.as_deref().unwrap_or(""), 30),
            row.tags_summary
        );
    }
    println!("{}", "=".repeat(100));
    println!("{} prompt(s)", results.len());
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn print_usage() {
    println!(
        r#"prompt-keeper v{} - Your prompts, found while you type

USAGE:
    prompt-keeper <COMMAND> [OPTIONS]

COMMANDS:
    add [text] [--purpose P] [--body B|-] [--urls U] [--tags a,b] [--note N]
                           Save a new prompt
    show <id>              Show a prompt
    edit <id> [flags]      Change fields of a prompt (same flags as add)
    copy <id>              Duplicate a prompt
    delete <id>...         Delete prompts
    search [terms] [--sort col[:desc]]
                           Search all fields (no terms lists everything)
    tag <tag> [--sort ..]  Find prompts with a tag
    list [--sort ..]       List every prompt
    reindex                Rebuild the search index
    verify                 Check the search index against the store
    stats                  Show counts
    analyze [text|-]       Text statistics and tag suggestions
    version                Show version
    help                   Show this help

SORT COLUMNS:
    id, created, modified, purpose, tags

EXAMPLES:
    prompt-keeper add "Explain recursion simply" --purpose teaching --tags cs,intro
    prompt-keeper search recur
    prompt-keeper search "exact phrase" --sort modified:desc
    prompt-keeper tag intro

CONFIGURATION:
    Settings are read from ${} or the user config directory
    (prompt-keeper/settings.toml). Log level: PROMPT_KEEPER_LOG or RUST_LOG.
"#,
        env!("CARGO_PKG_VERSION"),
        CONFIG_ENV
    );
}

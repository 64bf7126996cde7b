use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};

use feedtree::config::Config;
use feedtree::model::{
    auto_update, DataRole, FeedDraft, FeedsModel, ImportTree, MessageColumn, MessagesModel,
    NodeId, ReadStatus, RoleData, TreeError, Value,
};
use feedtree::storage::{Database, DatabaseError, FeedFormat};
use feedtree::util::truncate_to_width;

/// Get the config directory path (~/.config/feedtree/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedtree"))
}

/// Atomically write a file using the write-to-temp-then-rename pattern, so
/// the destination is never left half written.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    // Unpredictable temp name so nobody can plant a symlink there first
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions or disk space",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk: disk may be full",
            temp_path.display()
        )
    })?;
    drop(temp_file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!(
                "Failed to remove existing '{}' before atomic replace",
                dst.display()
            )
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}': check permissions",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "feedtree", about = "Feed reader core: category tree and message table")]
struct Args {
    /// Database file (default: ~/.config/feedtree/feeds.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/feedtree/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Merge a JSON candidate tree into the feed tree
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// With --import, also import unchecked candidates
    #[arg(long, requires = "import")]
    all: bool,

    /// Write the feed tree as a JSON candidate tree
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Add a top-level feed with this URL
    #[arg(long, value_name = "URL")]
    add_feed: Option<String>,

    /// Title for --add-feed
    #[arg(long, requires = "add_feed", default_value = "New feed")]
    title: String,

    /// Mark every message of every feed as read
    #[arg(long)]
    mark_read: bool,

    /// Move every read message into the recycle bin
    #[arg(long)]
    delete_read: bool,

    /// Purge all messages in the recycle bin
    #[arg(long)]
    empty_bin: bool,

    /// Restore all messages in the recycle bin
    #[arg(long)]
    restore_bin: bool,

    /// List messages of the item at this tree path, e.g. "0.2"
    #[arg(long, value_name = "PATH")]
    messages: Option<String>,

    /// Print the feed tree
    #[arg(long)]
    tree: bool,

    /// Run the auto-update scheduler until interrupted
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // User-only access to the config directory
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args.db.clone().unwrap_or_else(|| config_dir.join("feeds.db"));
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedtree appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let mut feeds = match FeedsModel::open(db.clone(), &config).await {
        Ok(model) => model,
        Err(e @ TreeError::Load(_)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(import_file) = &args.import {
        let content = std::fs::read_to_string(import_file)
            .with_context(|| format!("Failed to read import file: {}", import_file.display()))?;
        let candidates: ImportTree =
            serde_json::from_str(&content).context("Import file is not a valid candidate tree")?;

        let report = feeds
            .merge_model(&candidates, !args.all)
            .await
            .context("Failed to import feeds")?;
        println!("{}", report.summary());
    }

    if let Some(url) = &args.add_feed {
        let draft = FeedDraft::new(args.title.as_str(), url.as_str(), FeedFormat::Rss2X);
        let root = feeds.root();
        feeds
            .add_feed(draft, root)
            .await
            .context("Failed to add feed")?;
        println!("Added feed: {}", url);
    }

    if args.mark_read {
        let all = feeds.all_feeds();
        feeds
            .mark_feeds_read(&all, ReadStatus::Read)
            .await
            .context("Failed to mark feeds read")?;
        println!("Marked {} feeds read.", all.len());
    }

    if args.delete_read {
        let all = feeds.all_feeds();
        feeds
            .mark_feeds_deleted(&all, true, true)
            .await
            .context("Failed to delete read messages")?;
        println!(
            "Recycle bin now holds {} messages.",
            feeds.counts(feeds.recycle_bin()).total
        );
    }

    if args.empty_bin {
        let purged = feeds
            .empty_bin()
            .await
            .context("Failed to empty recycle bin")?;
        println!("Purged {} messages.", purged);
    }

    if args.restore_bin {
        feeds
            .restore_bin()
            .await
            .context("Failed to restore recycle bin")?;
        println!("Recycle bin restored.");
    }

    if let Some(export_file) = &args.export {
        let tree = feeds.export_tree()?;
        let json = serde_json::to_vec_pretty(&tree).context("Failed to serialize feed tree")?;
        atomic_write(export_file, &json)?;
        println!("Exported feed tree to: {}", export_file.display());
    }

    if args.tree {
        print_tree(&feeds, feeds.root(), 0);
    }

    if let Some(path) = &args.messages {
        let indices = parse_tree_path(path)?;
        let node = feeds
            .item_for_index(&indices)
            .with_context(|| format!("No tree item at path {}", path))?;
        print_messages(&feeds, &db, &config, node).await?;
    }

    if args.watch {
        run_auto_update(&mut feeds).await;
    }

    Ok(())
}

fn parse_tree_path(path: &str) -> Result<Vec<usize>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('.')
        .map(|part| {
            part.parse::<usize>()
                .with_context(|| format!("Invalid tree path segment: {}", part))
        })
        .collect()
}

fn print_tree(feeds: &FeedsModel, node: NodeId, depth: usize) {
    // Depth-first with an explicit stack, children in display order
    let mut stack = vec![(node, depth)];
    while let Some((node, depth)) = stack.pop() {
        let Some(item) = feeds.item(node) else {
            continue;
        };
        if node != feeds.root() {
            let counts = feeds.counts(node);
            let title = truncate_to_width(&item.title, 60);
            println!(
                "{}{} ({}/{})",
                "  ".repeat(depth.saturating_sub(1)),
                title,
                counts.unread,
                counts.total
            );
        }
        for &child in feeds.tree().children(node).iter().rev() {
            stack.push((child, depth + 1));
        }
    }
}

async fn print_messages(
    feeds: &FeedsModel,
    db: &Database,
    config: &Config,
    node: NodeId,
) -> Result<()> {
    let item = feeds
        .loaded_item(node)
        .context("Tree item disappeared")?;
    let mut messages = MessagesModel::new(db.clone(), config);
    if !messages.load_messages(Some(item)).await? {
        eprintln!("Warning: messages of this item could not be loaded");
    }

    for row in 0..messages.row_count() {
        let text = |column| match messages.data(row, column, DataRole::Display) {
            RoleData::Value(Value::Text(s)) => s,
            RoleData::Value(Value::Integer(i)) => i.to_string(),
            _ => String::new(),
        };
        let unread = matches!(
            messages.data(row, MessageColumn::Title, DataRole::Font),
            RoleData::Font(font) if font.bold
        );
        println!(
            "{} {}  {}  {}",
            if unread { "*" } else { " " },
            text(MessageColumn::DateCreated),
            truncate_to_width(&text(MessageColumn::Author), 20),
            truncate_to_width(&text(MessageColumn::Title), 70),
        );
    }
    Ok(())
}

/// Drive the auto-update scheduler. Fetching is done elsewhere; due feeds
/// are only reported here.
async fn run_auto_update(feeds: &mut FeedsModel) {
    let mut ticker = auto_update::ticker(feeds.auto_update_tick_period());
    // The first tick of a tokio interval completes immediately
    ticker.tick().await;

    println!("Watching for scheduled updates, press Ctrl+C to stop.");
    while feeds.is_auto_update_timer_active() {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(due) = feeds.execute_next_auto_update() else {
                    continue;
                };
                for node in due {
                    if let Some(item) = feeds.item(node) {
                        println!("Update due: {}", item.title);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                feeds.quit();
            }
        }
    }
}

//! linelens CLI
//!
//! Entry point for the `linelens` command-line tool.

use clap::{Parser, Subcommand};
use linelens::{
    EffectiveConfig, EngineConfig, PatternList, ScopeId, ScopeTree, Session, SettingKey,
    SettingValue, SettingsService,
};
use serde::Serialize;
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "linelens")]
#[command(about = "Scoped line-count badge settings", version)]
struct Cli {
    /// Workspace root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Engine config file (default: <root>/.linelens/engine.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Target the Global scope instead of the given path
    #[arg(long, global = true)]
    global: bool,

    /// Log filter when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show effective settings for a path, with where each value comes from
    Resolve {
        /// File or directory inside the workspace
        path: PathBuf,

        /// Only this key (e.g. thresholds.mid)
        #[arg(long, short = 'k')]
        key: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Set a setting at a directory's scope
    Set {
        path: PathBuf,
        key: String,
        /// Value; pattern lists are comma separated
        value: String,
    },

    /// Remove a setting from a directory's scope so it inherits again
    Reset { path: PathBuf, key: String },

    /// Inspect or edit include/exclude pattern lists
    Patterns {
        #[command(subcommand)]
        action: PatternCommands,
    },

    /// Fold legacy per-directory settings files into the store
    Migrate {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Line statistics and badge for a file or folder
    Stats {
        path: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// List effective patterns and their source
    List {
        path: PathBuf,
        /// exclude or include
        #[arg(long, default_value = "exclude")]
        list: String,
        #[arg(long)]
        json: bool,
    },

    /// Add a pattern, copying the inherited list on first edit
    Add {
        path: PathBuf,
        pattern: String,
        #[arg(long, default_value = "exclude")]
        list: String,
    },

    /// Remove a pattern, copying the inherited list on first edit
    Remove {
        path: PathBuf,
        pattern: String,
        #[arg(long, default_value = "exclude")]
        list: String,
    },
}

/// Everything a command needs.
struct Context {
    root: PathBuf,
    config: EngineConfig,
    global: bool,
}

impl Context {
    fn service(&self) -> SettingsService {
        SettingsService::with_file_stores(&self.root, &self.config)
    }

    /// Scope named on the command line.
    fn scope(&self, path: &Path) -> ScopeId {
        if self.global {
            return ScopeId::Global;
        }
        let path = absolute(path);
        let tree = ScopeTree::new(&self.root);
        let checked = if path.is_file() {
            match path.parent() {
                Some(dir) => tree.checked_dir(dir),
                None => Ok(ScopeId::Root),
            }
        } else {
            tree.checked_dir(&path)
        };
        checked.unwrap_or_else(|e| fail("Invalid path", e))
    }
}

fn main() {
    let cli = Cli::parse();

    let root = match &cli.root {
        Some(root) => absolute(root),
        None => env::current_dir().unwrap_or_else(|e| fail("Cannot read current directory", e)),
    };
    let overrides = cli
        .log_level
        .as_ref()
        .map(|level| serde_json::json!({ "log_level": level }));
    let effective = EffectiveConfig::build(&root, cli.config.as_deref(), overrides)
        .unwrap_or_else(|e| fail("Error loading config", e));
    init_tracing(&effective.config.log_level);

    let ctx = Context {
        root,
        config: effective.config,
        global: cli.global,
    };

    match cli.command {
        Commands::Resolve { path, key, json } => run_resolve(&ctx, &path, key.as_deref(), json),
        Commands::Set { path, key, value } => run_set(&ctx, &path, &key, &value),
        Commands::Reset { path, key } => run_reset(&ctx, &path, &key),
        Commands::Patterns { action } => match action {
            PatternCommands::List { path, list, json } => run_patterns_list(&ctx, &path, &list, json),
            PatternCommands::Add { path, pattern, list } => {
                run_pattern_edit(&ctx, &path, &list, &pattern, true)
            }
            PatternCommands::Remove { path, pattern, list } => {
                run_pattern_edit(&ctx, &path, &list, &pattern, false)
            }
        },
        Commands::Migrate { json } => run_migrate(&ctx, json),
        Commands::Stats { path, json } => run_stats(&ctx, &path, json),
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_resolve(ctx: &Context, path: &Path, key: Option<&str>, json: bool) {
    let scope = ctx.scope(path);
    let service = ctx.service();

    if let Some(key) = key {
        let key: SettingKey = key.parse().unwrap_or_else(|e| fail("Invalid key", e));
        let resolved = service
            .resolve_field(&ctx.root, &scope, key)
            .unwrap_or_else(|e| fail("Error resolving settings", e));
        if json {
            print_json(&resolved);
        } else {
            println!("{} = {}  ({})", key, resolved.value, resolved.source);
        }
        return;
    }

    let all = service
        .resolve(&ctx.root, &scope)
        .unwrap_or_else(|e| fail("Error resolving settings", e));
    if json {
        print_json(&all);
        return;
    }
    println!("Effective settings for {}:\n", scope);
    for (key, resolved) in &all {
        println!("  {:<22} {}  ({})", key.as_str(), resolved.value, resolved.source);
    }
}

fn run_set(ctx: &Context, path: &Path, key: &str, value: &str) {
    let scope = ctx.scope(path);
    let key: SettingKey = key.parse().unwrap_or_else(|e| fail("Invalid key", e));
    let value = SettingValue::parse_for(key, value).unwrap_or_else(|e| fail("Invalid value", e));

    let mut service = ctx.service();
    service
        .set_field(&ctx.root, &scope, key, value.clone())
        .unwrap_or_else(|e| fail("Error saving setting", e));
    println!("Set {} = {} at {}", key, value, scope);
}

fn run_reset(ctx: &Context, path: &Path, key: &str) {
    let scope = ctx.scope(path);
    let key: SettingKey = key.parse().unwrap_or_else(|e| fail("Invalid key", e));

    let mut service = ctx.service();
    let removed = service
        .reset_field(&ctx.root, &scope, key)
        .unwrap_or_else(|e| fail("Error resetting setting", e));
    if removed {
        let now = service
            .resolve_field(&ctx.root, &scope, key)
            .unwrap_or_else(|e| fail("Error resolving settings", e));
        println!("Reset {} at {}; now {} from {}", key, scope, now.value, now.source);
    } else {
        println!("{} is not set at {}; nothing to reset", key, scope);
    }
}

fn run_patterns_list(ctx: &Context, path: &Path, list: &str, json: bool) {
    let scope = ctx.scope(path);
    let list: PatternList = list.parse().unwrap_or_else(|e| fail("Invalid list", e));
    let entries = ctx
        .service()
        .patterns_with_source(&ctx.root, &scope, list)
        .unwrap_or_else(|e| fail("Error resolving patterns", e));

    if json {
        print_json(&entries);
        return;
    }
    if entries.is_empty() {
        println!("No {} patterns at {}.", list.key(), scope);
        return;
    }
    println!("{} at {} (from {}):\n", list.key(), scope, entries[0].source);
    for entry in &entries {
        let marker = if entry.is_local(&scope) { "local" } else { "inherited" };
        println!("  {:<40} {}", entry.pattern, marker);
    }
}

fn run_pattern_edit(ctx: &Context, path: &Path, list: &str, pattern: &str, add: bool) {
    let scope = ctx.scope(path);
    let list: PatternList = list.parse().unwrap_or_else(|e| fail("Invalid list", e));

    let mut service = ctx.service();
    let result = if add {
        service.add_pattern(&ctx.root, &scope, list, pattern)
    } else {
        service.remove_pattern(&ctx.root, &scope, list, pattern)
    };
    let edit = result.unwrap_or_else(|e| fail("Error editing patterns", e));

    if !edit.changed {
        println!("{} unchanged at {}", list.key(), scope);
        return;
    }
    if let Some(source) = &edit.copied_from {
        println!("Copied inherited list from {}", source);
    }
    println!("{} at {}: [{}]", list.key(), scope, edit.patterns.join(", "));
}

fn run_migrate(ctx: &Context, json: bool) {
    let mut service = ctx.service();
    let report = service
        .migrate_and_cleanup(&ctx.root)
        .unwrap_or_else(|e| fail("Error migrating settings", e));

    if json {
        print_json(&report);
    } else {
        for file in &report.files {
            println!("  migrated {} -> {}", file.path.display(), file.scope);
        }
        for failure in &report.errors {
            println!("  failed   {}: {}", failure.path.display(), failure.message);
        }
        println!(
            "Migrated {} legacy file(s), {} failure(s).",
            report.migrated,
            report.errors.len()
        );
    }

    if !report.errors.is_empty() {
        process::exit(1);
    }
}

fn run_stats(ctx: &Context, path: &Path, json: bool) {
    let path = absolute(path);
    let mut session = Session::open(&ctx.root, &ctx.config);

    if path.is_dir() {
        let folder = session
            .folder_stats(&path)
            .unwrap_or_else(|e| fail("Error computing folder stats", e));
        let decoration = session
            .decoration(&path)
            .unwrap_or_else(|e| fail("Error computing badge", e));
        if json {
            print_json(&serde_json::json!({ "folder": folder, "decoration": decoration }));
        } else {
            println!("{}: {} files, {} lines", path.display(), folder.files, folder.stats.line_count);
            if let Some(d) = decoration {
                println!("  {} {}", d.glyph, d.severity.as_str());
            }
        }
        return;
    }

    let stats = session
        .file_stats(&path)
        .unwrap_or_else(|e| fail("Error scanning file", e));
    let decoration = session
        .decoration(&path)
        .unwrap_or_else(|e| fail("Error computing badge", e));
    if json {
        print_json(&serde_json::json!({ "stats": stats, "decoration": decoration }));
    } else {
        let s = stats.stats;
        println!("{}: {} lines", path.display(), s.line_count);
        println!("  code {}, comment {}, blank {}", s.code_lines, s.comment_lines, s.blank_lines);
        match decoration {
            Some(d) => println!("  {} {}", d.glyph, d.severity.as_str()),
            None => println!("  excluded by patterns"),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => fail("Cannot read current directory", e),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Error serializing output", e),
    }
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{}: {}", context, err);
    process::exit(1);
}

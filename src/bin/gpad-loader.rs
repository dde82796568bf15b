//! gpad-loader CLI: load GPAD files into a Chado database.
//!
//! Usage:
//!   gpad-loader init [--db path]
//!   gpad-loader load <file> [--db path] [--config file] [--namespace ns] [--catalog file] [--json]
//!   gpad-loader statements [--catalog file]

use clap::{Parser, Subcommand};
use gpad_chado::{
    ChadoStore, GpadLoader, LoaderConfig, NamedStatements, OpenStore, Statement, StatementCatalog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gpad-loader",
    version,
    about = "Incremental GPAD annotation loader for Chado"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Chado tables the loader needs
    Init {
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// YAML statement catalog replacing the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Load (or merge) a GPAD file into a namespace
    Load {
        /// GPAD 1.1 file
        #[arg(required = true)]
        file: PathBuf,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// YAML loader configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Annotation namespace (overrides the config file)
        #[arg(long)]
        namespace: Option<String>,
        /// YAML statement catalog replacing the bundled one
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a statement catalog for missing statements
    Statements {
        /// YAML statement catalog; the bundled one when omitted
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// Get the default database path (~/.local/share/gpad-chado/chado.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("gpad-chado").join("chado.db")
}

fn load_catalog(path: Option<&Path>) -> Result<NamedStatements, String> {
    match path {
        Some(path) => NamedStatements::from_file(path)
            .map_err(|e| format!("Failed to read catalog {}: {}", path.display(), e)),
        None => NamedStatements::bundled().map_err(|e| format!("Bundled catalog is invalid: {}", e)),
    }
}

fn open_store(db: Option<PathBuf>, catalog: Option<&Path>) -> Result<ChadoStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store = match catalog {
        Some(_) => {
            let catalog = load_catalog(catalog)?;
            let store = ChadoStore::open_with_catalog(&db_path, Arc::new(catalog))
                .map_err(|e| format!("Failed to open database: {}", e))?;
            store
                .deploy_schema()
                .map_err(|e| format!("Failed to deploy schema: {}", e))?;
            store
        }
        None => ChadoStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?,
    };
    Ok(store)
}

fn cmd_init(db: Option<PathBuf>, catalog: Option<PathBuf>) -> i32 {
    match open_store(db, catalog.as_deref()) {
        Ok(_) => {
            println!("Chado schema ready");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_load(
    file: &Path,
    db: Option<PathBuf>,
    config: Option<PathBuf>,
    namespace: Option<String>,
    catalog: Option<PathBuf>,
    json: bool,
) -> i32 {
    let mut loader_config = match config {
        Some(path) => match LoaderConfig::from_file(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: cannot read config '{}': {}", path.display(), e);
                return 1;
            }
        },
        None => LoaderConfig::default(),
    };
    if let Some(namespace) = namespace {
        loader_config = loader_config.with_namespace(namespace);
    }

    let store = match open_store(db, catalog.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let loader = GpadLoader::new(Arc::new(store), loader_config);
    match loader.load_path(file) {
        Ok(report) => {
            if json {
                match report.to_json() {
                    Ok(s) => println!("{}", s),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return 1;
                    }
                }
            } else {
                print!("{}", report);
                for issue in &report.issues {
                    eprintln!("Warning: {}", issue);
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(statement) = e.statement() {
                eprintln!("  statement: {}", statement);
            }
            if let Some(record) = e.record() {
                eprintln!("  record: {}", record);
            }
            // 75 (EX_TEMPFAIL) tells wrappers a rerun may succeed
            if e.is_retryable() {
                75
            } else {
                1
            }
        }
    }
}

fn cmd_statements(catalog: Option<PathBuf>) -> i32 {
    let catalog = match load_catalog(catalog.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let missing = catalog.missing();
    for statement in Statement::ALL {
        let status = if missing.contains(statement) { "missing" } else { "ok" };
        println!("{:<32}  {}", statement.name(), status);
    }
    if missing.is_empty() {
        0
    } else {
        eprintln!("Error: {} statement(s) missing", missing.len());
        1
    }
}

/// Log filter from `RUST_LOG` directives, falling back to `info` when they
/// are unset or invalid
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Init { db, catalog } => cmd_init(db, catalog),
        Commands::Load {
            file,
            db,
            config,
            namespace,
            catalog,
            json,
        } => cmd_load(&file, db, config, namespace, catalog, json),
        Commands::Statements { catalog } => cmd_statements(catalog),
    };
    std::process::exit(code);
}

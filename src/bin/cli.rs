//! FluxDB CLI Client
//!
//! Command-line interface for interacting with a FluxDB server.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fluxdb::{
    Client, ClientConfig, DocId, Document, FluxError, FramingMode, GetFilter, IndexKind,
    Outcome, Query, Reply,
};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// FluxDB CLI
#[derive(Parser, Debug)]
#[command(name = "fluxdb-cli")]
#[command(about = "CLI for the FluxDB document store")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Database to USE before running the command
    #[arg(short, long)]
    database: Option<String>,

    /// Read timeout in milliseconds
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Frame replies by short reads instead of newlines
    #[arg(long)]
    heuristic_framing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a JSON document
    Insert {
        /// Document, e.g. '{"username": "ada"}'
        document: String,
    },

    /// Find documents matching a JSON query
    Find {
        /// Query, e.g. '{"level": {"$gt": 10}}'
        query: String,

        /// Print matching documents instead of ids
        #[arg(long)]
        documents: bool,
    },

    /// Overwrite a document
    Update {
        id: DocId,
        document: String,
    },

    /// Delete a document
    Delete { id: DocId },

    /// Create an index on a field
    Index {
        field: String,

        /// Index kind (0 = hash, 1 = sorted)
        #[arg(default_value = "0")]
        kind: i32,
    },

    /// Fetch by id, by range (start-end), or everything
    Get { filter: Option<String> },

    /// List databases
    Dbs,

    /// Show database statistics
    Stats,

    /// Remove every document in the database
    Flush,

    /// Send a raw command line
    Raw {
        #[arg(trailing_var_arg = true, required = true)]
        words: Vec<String>,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,fluxdb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match ClientConfig::builder()
        .host(&args.host)
        .port(args.port)
        .read_timeout_ms(args.read_timeout_ms)
        .framing(if args.heuristic_framing {
            FramingMode::Heuristic
        } else {
            FramingMode::Delimited
        })
        .try_build()
    {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut client = Client::connect(config);

    match run(&mut client, &args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute the selected command; `Ok(false)` when the server refused it
fn run(client: &mut Client, args: &Args) -> fluxdb::Result<bool> {
    if let Some(database) = &args.database {
        if !report(client.use_database(database)?, |_| {}) {
            return Ok(false);
        }
    }

    let succeeded = match &args.command {
        Commands::Insert { document } => {
            let document = parse_document(document)?;
            report(client.insert(&document)?, |id| println!("{}", id))
        }
        Commands::Find { query, documents } => {
            let query = Query::from(parse_document(query)?);
            if *documents {
                report(client.find_documents(&query)?, print_documents)
            } else {
                report(client.find(&query)?, |ids| {
                    for id in ids {
                        println!("{}", id);
                    }
                })
            }
        }
        Commands::Update { id, document } => {
            let document = parse_document(document)?;
            report(client.update(*id, &document)?, |_| println!("updated {}", id))
        }
        Commands::Delete { id } => report(client.delete(*id)?, |_| println!("deleted {}", id)),
        Commands::Index { field, kind } => report(
            client.create_index(field, IndexKind::from(*kind))?,
            |_| println!("index created on {}", field),
        ),
        Commands::Get { filter } => {
            let filter = parse_get_filter(filter.as_deref());
            report(client.get(&filter)?, print_reply)
        }
        Commands::Dbs => report(client.show_databases()?, |databases| {
            for database in databases {
                println!("{}", database);
            }
        }),
        Commands::Stats => report(client.stats()?, |stats| print_json(&Value::Object(stats))),
        Commands::Flush => report(client.flush_db()?, |_| println!("flushed")),
        Commands::Raw { words } => {
            let exchange = client.raw_command(&words.join(" "))?;
            println!("{}", exchange.text());
            !exchange.is_connection_lost()
        }
    };

    Ok(succeeded)
}

/// Print a successful value, or the failure to stderr
fn report<T>(outcome: Outcome<T>, on_success: impl FnOnce(T)) -> bool {
    match outcome {
        Outcome::Success(value) => {
            on_success(value);
            true
        }
        Outcome::Failed(reason) => {
            eprintln!("{}", reason);
            false
        }
        Outcome::TransportFailure => {
            eprintln!("connection lost; the command may not have been applied");
            false
        }
    }
}

fn parse_document(text: &str) -> fluxdb::Result<Document> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(document) => Ok(document),
        other => Err(FluxError::Serialization(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn parse_get_filter(text: Option<&str>) -> GetFilter {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return GetFilter::All;
    };

    if let Ok(id) = text.parse::<DocId>() {
        return GetFilter::Id(id);
    }

    if let Some((start, end)) = text.split_once('-') {
        if let (Ok(start), Ok(end)) = (start.trim().parse(), end.trim().parse()) {
            return GetFilter::Range(start, end);
        }
    }

    GetFilter::Raw(text.to_string())
}

fn print_reply(reply: Reply) {
    match reply {
        Reply::Listing(entries) => {
            for entry in entries {
                match entry.document {
                    Some(document) => print_json(&Value::Object(document)),
                    None => println!("{}", entry.id),
                }
            }
        }
        Reply::Object(document) => print_json(&Value::Object(document)),
        other => println!("{}", other.describe()),
    }
}

fn print_documents(documents: Vec<(DocId, Document)>) {
    for (_, document) in documents {
        print_json(&Value::Object(document));
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

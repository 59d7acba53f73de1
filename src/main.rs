use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use archgraph::config::EngineConfig;
use archgraph::database::migrations::{migrate_database, MigrateDirection};
use archgraph::engine::GraphEngine;
use archgraph::query::{AggregateSelection, QueryArgs};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Engine configuration file (YAML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Print the entity types of the loaded schema
    Schema,
    /// List entities, or page through them when --first or --after is given
    Query {
        #[clap(value_name = "TYPE")]
        type_name: String,
        #[clap(short, long)]
        r#where: Option<String>,
        #[clap(short, long)]
        sort: Option<String>,
        #[clap(long)]
        limit: Option<usize>,
        #[clap(long)]
        offset: Option<usize>,
        #[clap(long)]
        first: Option<usize>,
        #[clap(long)]
        after: Option<String>,
    },
    Aggregate {
        #[clap(value_name = "TYPE")]
        type_name: String,
        #[clap(short, long)]
        r#where: Option<String>,
        /// Comma separated fields to summarize; all aggregatable fields when omitted
        #[clap(short, long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },
    Create {
        #[clap(value_name = "TYPE")]
        type_name: String,
        /// Create input: one object or a list of objects
        #[clap(short, long)]
        input: String,
    },
    Update {
        #[clap(value_name = "TYPE")]
        type_name: String,
        #[clap(short, long)]
        r#where: Option<String>,
        #[clap(short, long)]
        update: String,
    },
    Delete {
        #[clap(value_name = "TYPE")]
        type_name: String,
        #[clap(short, long)]
        r#where: Option<String>,
        #[clap(short, long)]
        delete: Option<String>,
    },
    /// Execute a GraphQL document against the engine
    #[cfg(feature = "graphql")]
    Graphql {
        #[clap(short, long)]
        file: PathBuf,
        #[clap(long)]
        variables: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init {
        #[clap(short, long)]
        database: Option<String>,
    },
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let config = EngineConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Db { command } => match command {
            DbCommands::Init { database } => {
                let database = database.unwrap_or_else(|| config.database_url.clone());
                info!("Initializing database: {}", database);
                migrate_database(&database, MigrateDirection::Up).await?;
            }
            DbCommands::Migrate {
                direction,
                database,
            } => {
                let database = database.unwrap_or_else(|| config.database_url.clone());
                info!("Running database migration: {:?}", direction);
                migrate_database(&database, direction).await?;
            }
        },
        Commands::Schema => {
            let registry = config.load_registry()?;
            for entity in registry.entity_types() {
                println!("type {}", entity.name);
                for field in &entity.fields {
                    let kind = field.kind.graphql_name();
                    let kind = if field.list {
                        format!("[{}]", kind)
                    } else {
                        kind.to_string()
                    };
                    let required = if field.nullable { "" } else { "!" };
                    println!("  {}: {}{}", field.name, kind, required);
                }
                for rel in &entity.relationships {
                    let target = if rel.is_many() {
                        format!("[{}]", rel.target)
                    } else {
                        rel.target.clone()
                    };
                    println!(
                        "  {}: {} @relationship(type: {}, direction: {:?})",
                        rel.name, target, rel.rel_type, rel.direction
                    );
                }
            }
        }
        Commands::Query {
            type_name,
            r#where,
            sort,
            limit,
            offset,
            first,
            after,
        } => {
            let engine = GraphEngine::from_config(config).await?;
            let paged = first.is_some() || after.is_some();
            let args = QueryArgs {
                where_: parse_json("where", r#where.as_deref())?,
                sort: parse_json("sort", sort.as_deref())?,
                first,
                after,
                limit,
                offset,
            };
            if paged {
                print_json(&engine.connection(&type_name, &args).await?)?;
            } else {
                print_json(&engine.find(&type_name, &args).await?)?;
            }
        }
        Commands::Aggregate {
            type_name,
            r#where,
            fields,
        } => {
            let engine = GraphEngine::from_config(config).await?;
            let where_ = parse_json("where", r#where.as_deref())?;
            let selection = AggregateSelection {
                node: fields,
                edge: None,
            };
            print_json(&engine.aggregate(&type_name, where_.as_ref(), &selection).await?)?;
        }
        Commands::Create { type_name, input } => {
            let engine = GraphEngine::from_config(config).await?;
            let input = serde_json::from_str::<Value>(&input).context("Invalid JSON in --input")?;
            print_json(&engine.create(&type_name, &input).await?)?;
        }
        Commands::Update {
            type_name,
            r#where,
            update,
        } => {
            let engine = GraphEngine::from_config(config).await?;
            let where_ = parse_json("where", r#where.as_deref())?;
            let update = parse_json("update", Some(update.as_str()))?;
            print_json(
                &engine
                    .update(&type_name, where_.as_ref(), update.as_ref())
                    .await?,
            )?;
        }
        Commands::Delete {
            type_name,
            r#where,
            delete,
        } => {
            let engine = GraphEngine::from_config(config).await?;
            let where_ = parse_json("where", r#where.as_deref())?;
            let delete = parse_json("delete", delete.as_deref())?;
            print_json(
                &engine
                    .delete(&type_name, where_.as_ref(), delete.as_ref())
                    .await?,
            )?;
        }
        #[cfg(feature = "graphql")]
        Commands::Graphql { file, variables } => {
            let engine = GraphEngine::from_config(config).await?;
            let document = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read GraphQL document {}", file.display()))?;
            let mut request = async_graphql::Request::new(document);
            if let Some(variables) = parse_json("variables", variables.as_deref())? {
                request = request.variables(async_graphql::Variables::from_json(variables));
            }

            let schema = archgraph::graphql::build_schema(std::sync::Arc::new(engine));
            let response = schema.execute(request).await;
            print_json(&response)?;
        }
    }

    Ok(())
}

fn parse_json(argument: &str, raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|raw| {
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON in --{}", argument))
    })
    .transpose()
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "sqlx=warn,sea_orm=warn,{}",
            log_level
        )))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

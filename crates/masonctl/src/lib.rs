//! masonctl is the CLI of the schema, index and migration manager: it
//! validates a declarative input tree, renders its schemas, and advances
//! live collections to their latest declared versions.

use std::path::Path;

use anyhow::Context as _;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use dictionary::{Context, EnumeratorRegistry};
use mason_cli_common::LogArgs;
use models::{Errors, Version};
use runtime::{Options, Processor, Status};
use sources::Sources;

/// Process exit codes of batch processing (see [`run`]).
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_VALIDATION: i32 = 2;

/// masonctl manages the schemas, indexes and migrations of a document
/// database from a declarative configuration tree.
#[derive(Debug, Parser)]
#[clap(author, name = "masonctl", version)]
pub struct Masonctl {
    #[clap(flatten)]
    pub log_args: LogArgs,

    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Root directory of the declarative input tree.
    #[clap(long = "source", env = "MASON_SOURCE", default_value = ".", global = true)]
    pub source: String,

    /// Process all collections when invoked without a subcommand.
    #[clap(long, env = "AUTO_PROCESS")]
    pub auto_process: bool,

    /// Exit with the batch status code (0 all current, 1 any failed,
    /// 2 validation errors) after auto-processing.
    #[clap(long, env = "EXIT_AFTER_PROCESSING")]
    pub exit_after_processing: bool,

    #[clap(subcommand)]
    pub subcommand: Option<Subcommand>,
}

#[derive(Debug, clap::Args)]
pub struct ConnectionArgs {
    /// Database connection string, injected as-is into the driver.
    #[clap(
        long = "db-uri",
        env = "MONGODB_URI",
        default_value = "mongodb://localhost:27017",
        hide_env_values = true,
        global = true
    )]
    pub uri: String,

    /// Database holding the managed collections.
    #[clap(long = "db-name", env = "MONGODB_DATABASE", default_value = "mason", global = true)]
    pub database: String,

    /// Collection holding the per-collection version records.
    #[clap(
        long = "version-collection",
        env = "VERSION_COLLECTION",
        default_value = runtime::DEFAULT_VERSION_COLLECTION,
        global = true
    )]
    pub version_collection: String,

    /// Load declared test data after each successful transition.
    #[clap(long = "load-test-data", env = "LOAD_TEST_DATA", global = true)]
    pub load_test_data: bool,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Subcommand {
    /// Validate the input tree and report every error found.
    Validate,
    /// Advance collections from their recorded versions to the latest
    /// declared versions.
    Process(ProcessArgs),
    /// Render a schema document for one collection version.
    Render(RenderArgs),
    /// List collections with their recorded current versions.
    List,
}

#[derive(Debug, clap::Args)]
pub struct ProcessArgs {
    /// Process only this collection.
    #[clap(long)]
    pub name: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct RenderArgs {
    /// Output form to render.
    #[clap(value_enum)]
    pub form: RenderForm,
    /// Render target, as `<collection>.<major>.<minor>.<patch>.<enumerators>`.
    pub target: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum RenderForm {
    JsonSchema,
    BsonSchema,
    Openapi,
}

/// Run the parsed invocation, returning the process exit code.
pub async fn run(cli: Masonctl) -> anyhow::Result<i32> {
    let sources = sources::load_tree(Path::new(&cli.source));

    match cli.subcommand {
        Some(Subcommand::Validate) => run_validate(&sources),
        Some(Subcommand::Process(ref args)) => {
            let name = args.name.clone();
            run_process(&cli, &sources, name.as_deref()).await
        }
        Some(Subcommand::Render(ref args)) => run_render(&sources, args),
        Some(Subcommand::List) => run_list(&cli, &sources).await,
        None if cli.auto_process => {
            let code = run_process(&cli, &sources, None).await?;
            if cli.exit_after_processing {
                Ok(code)
            } else {
                Ok(EXIT_OK)
            }
        }
        None => {
            anyhow::bail!("no subcommand given; try `masonctl process` or set AUTO_PROCESS=true")
        }
    }
}

fn run_validate(sources: &Sources) -> anyhow::Result<i32> {
    let errors = validation::validate(sources);
    print_errors(&errors);

    if errors.is_empty() {
        println!("configuration is valid");
        Ok(EXIT_OK)
    } else {
        Ok(EXIT_VALIDATION)
    }
}

async fn run_process(
    cli: &Masonctl,
    sources: &Sources,
    name: Option<&str>,
) -> anyhow::Result<i32> {
    let errors = validation::validate(sources);
    if !errors.is_empty() {
        print_errors(&errors);
        tracing::error!(errors = errors.len(), "validation failed; refusing to process");
        return Ok(EXIT_VALIDATION);
    }

    let db = mongo::MongoDb::connect(&cli.connection.uri, &cli.connection.database).await?;
    let options = Options {
        version_collection: cli.connection.version_collection.clone(),
        load_test_data: cli.connection.load_test_data,
        ..Options::default()
    };
    let processor = Processor::new(&db, options);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping between steps");
                cancel.cancel();
            }
        });
    }

    let reports = match name {
        Some(name) => {
            let report = processor
                .run_one(sources, name, &cancel)
                .await
                .with_context(|| format!("collection {name:?} is not configured"))?;
            vec![report]
        }
        None => processor.run_all(sources, &cancel).await,
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports
        .iter()
        .any(|report| report.status == Status::Failed);
    Ok(if failed { EXIT_FAILED } else { EXIT_OK })
}

fn run_render(sources: &Sources, args: &RenderArgs) -> anyhow::Result<i32> {
    let errors = validation::validate(sources);
    if !errors.is_empty() {
        print_errors(&errors);
        return Ok(EXIT_VALIDATION);
    }

    let (collection, version) = parse_render_target(&args.target)?;

    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sources.enumerators, &mut errors);
    let ctx = Context {
        registry: &registry,
        types: &sources.types,
        schemas: &sources.schemas,
        enumerator_version: Some(version.enumerators),
    };

    let stem = format!("{collection}.{}", version.schema_suffix());
    let Some(resolved) = ctx.resolve_file(&stem, &mut errors) else {
        anyhow::bail!("schema file dictionary/{stem}.yaml was not found");
    };
    if !errors.is_empty() {
        print_errors(&errors);
        return Ok(EXIT_VALIDATION);
    }

    let rendered = match args.form {
        RenderForm::JsonSchema => dictionary::render_json_schema(&resolved),
        RenderForm::BsonSchema => dictionary::render_bson_schema(&resolved),
        RenderForm::Openapi => dictionary::render_open_api(&collection, &resolved),
    };
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(EXIT_OK)
}

async fn run_list(cli: &Masonctl, sources: &Sources) -> anyhow::Result<i32> {
    let db = mongo::MongoDb::connect(&cli.connection.uri, &cli.connection.database).await?;
    let processor = Processor::new(
        &db,
        Options {
            version_collection: cli.connection.version_collection.clone(),
            ..Options::default()
        },
    );

    let records = processor
        .current_versions(sources)
        .await
        .context("failed to read version records")?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(EXIT_OK)
}

fn print_errors(errors: &Errors) {
    for error in errors.iter() {
        println!("{error}");
    }
}

/// Split `<collection>.<major>.<minor>.<patch>.<enumerators>` into its
/// collection name and version.
fn parse_render_target(target: &str) -> anyhow::Result<(String, Version)> {
    let mut pieces: Vec<&str> = target.rsplitn(5, '.').collect();
    if pieces.len() != 5 {
        anyhow::bail!(
            "render target {target:?} must take the form <collection>.<major>.<minor>.<patch>.<enumerators>"
        );
    }
    pieces.reverse();

    let collection = pieces[0].to_string();
    let version: Version = pieces[1..]
        .join(".")
        .parse()
        .with_context(|| format!("render target {target:?} has a bad version"))?;
    Ok((collection, version))
}

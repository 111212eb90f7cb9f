//! Process Analytics Core - branch divergence and duration outliers
//!
//! The main entry point for pa-core, handling:
//! - Branch divergence analysis of one gateway towards a target node
//! - Duration outlier findings, histograms and significant variable terms
//! - Configuration inspection, JSON schema export and shell completions
//!
//! Analyses run against a dataset file (definitions plus recorded instances)
//! loaded into the in-memory reference store.

use clap::{Args, CommandFactory, Parser, Subcommand};
use pa_common::{
    format_error_human, DefinitionScope, DefinitionType, Error, ExternalFilter, StructuredError,
    SystemClock, SCHEMA_VERSION,
};
use pa_config::{load_config, LoadedConfig, CONFIG_SCHEMA_VERSION};
use pa_core::access::AccessPolicy;
use pa_core::branch::{BranchAnalysisRequest, BranchAnalyzer};
use pa_core::definition::DocumentDefinitionService;
use pa_core::exit_codes::ExitCode;
use pa_core::logging::{emit, event_names, init_logging, LogConfig, LogFormat, LogLevel, Stage};
use pa_core::outlier::{FlowNodeOutlierRequest, OutlierAnalyzer, OutlierRequest};
use pa_core::output::{self, OutputFormat};
use pa_core::schema::{available_schemas, generate_all_schemas, generate_schema};
use pa_core::store::{Dataset, InMemoryInstanceStore};
use pa_core::{AnalysisServices, RequestContext};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process Analytics Core - branch divergence and duration outlier analysis
#[derive(Parser)]
#[command(name = "pa-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Analysis configuration file (analysis.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file with definitions and recorded instances
    #[arg(long, global = true, env = "PA_DATASET")]
    dataset: Option<PathBuf>,

    /// User the analysis runs for
    #[arg(long, global = true, env = "PA_USER", default_value = "admin")]
    user: String,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Branch divergence of a gateway towards a target node
    Branch(BranchArgs),

    /// Duration outlier detection
    Outliers(OutliersArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print JSON schemas of request and result types
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print version information
    Version,
}

/// Which definitions and instances an analysis covers
#[derive(Args, Debug)]
struct ScopeArgs {
    /// Definition key
    #[arg(long)]
    key: String,

    /// Definition version (repeatable; all versions when omitted)
    #[arg(long = "definition-version", value_name = "VERSION")]
    versions: Vec<String>,

    /// Tenant id, in lookup order (repeatable)
    #[arg(long = "tenant", value_name = "TENANT")]
    tenants: Vec<String>,

    /// Also include the shared (tenant-less) definition
    #[arg(long)]
    include_shared: bool,

    /// Analyse decision definitions instead of processes
    #[arg(long)]
    decision: bool,

    /// Extra instance filters as a JSON array
    #[arg(long, value_name = "JSON")]
    filters: Option<String>,
}

impl ScopeArgs {
    fn scope(&self) -> DefinitionScope {
        let mut scope = DefinitionScope::new(&self.key);
        if !self.versions.is_empty() {
            scope = scope.with_versions(self.versions.iter().cloned());
        }
        if !self.tenants.is_empty() {
            let shared = self.include_shared.then_some(None);
            scope = scope.with_tenants(self.tenants.iter().cloned().map(Some).chain(shared));
        }
        scope
    }

    fn definition_type(&self) -> DefinitionType {
        if self.decision {
            DefinitionType::Decision
        } else {
            DefinitionType::Process
        }
    }

    fn filters(&self) -> Result<Vec<ExternalFilter>, Error> {
        match &self.filters {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| Error::Validation(format!("invalid --filters: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Args, Debug)]
struct BranchArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Gateway flow node id
    #[arg(long)]
    gateway: String,

    /// Target flow node id
    #[arg(long)]
    end_event: String,
}

#[derive(Args, Debug)]
struct OutliersArgs {
    #[command(subcommand)]
    command: OutlierCommands,
}

#[derive(Subcommand, Debug)]
enum OutlierCommands {
    /// Per flow node outlier findings with heat
    Findings(ScopeArgs),

    /// Duration histogram of one flow node
    Chart(FlowNodeArgs),

    /// Variable terms over-represented among a flow node's outliers
    Terms(FlowNodeArgs),
}

#[derive(Args, Debug)]
struct FlowNodeArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Flow node id
    #[arg(long)]
    flow_node: String,

    /// Lower outlier bound in milliseconds (computed when omitted)
    #[arg(long)]
    lower_bound: Option<f64>,

    /// Higher outlier bound in milliseconds (computed when omitted)
    #[arg(long)]
    higher_bound: Option<f64>,
}

impl FlowNodeArgs {
    fn request(&self) -> Result<FlowNodeOutlierRequest, Error> {
        Ok(FlowNodeOutlierRequest {
            definition_type: self.scope.definition_type(),
            scope: self.scope.scope(),
            filters: self.scope.filters()?,
            flow_node_id: self.flow_node.clone(),
            lower_bound: self.lower_bound,
            higher_bound: self.higher_bound,
        })
    }
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and where it came from
    Show,

    /// Validate a configuration file (or the resolved one)
    Check {
        /// Path to analysis.json
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type to print
    type_name: Option<String>,

    /// List available types
    #[arg(long)]
    list: bool,

    /// Print every schema
    #[arg(long)]
    all: bool,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Branch(args) => run_branch(&cli.global, args),
        Commands::Outliers(args) => match &args.command {
            OutlierCommands::Findings(args) => run_findings(&cli.global, args),
            OutlierCommands::Chart(args) => run_chart(&cli.global, args),
            OutlierCommands::Terms(args) => run_terms(&cli.global, args),
        },
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Schema(args) => run_schema(&cli.global, args),
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "pa-core",
                &mut std::io::stdout(),
            );
            ExitCode::Clean
        }
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Analysis commands
// ============================================================================

/// Configuration and in-memory services loaded for one invocation.
struct Workspace {
    loaded: LoadedConfig,
    definitions: DocumentDefinitionService,
    store: InMemoryInstanceStore,
    access: Box<dyn AccessPolicy>,
}

impl Workspace {
    fn open(global: &GlobalOpts, ctx: &RequestContext) -> Result<Self, ExitCode> {
        let loaded = load_config(global.config.as_deref())
            .map_err(|e| report_error(global, Some(ctx), &Error::Config(e.to_string())))?;
        emit(
            &ctx.log
                .info(event_names::CONFIG_LOADED, Stage::Init, "configuration loaded")
                .with_field("source", loaded.source.to_string())
                .with_field("path", loaded.path.as_ref().map(|p| p.display().to_string())),
        );

        let Some(path) = global.dataset.as_deref() else {
            let err = Error::Validation("--dataset (or PA_DATASET) is required".to_string());
            return Err(report_error(global, Some(ctx), &err));
        };
        let (definitions, store, access) =
            load_dataset(path).map_err(|e| report_error(global, Some(ctx), &e))?;
        Ok(Self {
            loaded,
            definitions,
            store,
            access,
        })
    }

    fn services(&self) -> AnalysisServices<'_> {
        AnalysisServices {
            definitions: &self.definitions,
            store: &self.store,
            access: self.access.as_ref(),
            variables: &self.store,
        }
    }
}

fn load_dataset(
    path: &Path,
) -> Result<
    (
        DocumentDefinitionService,
        InMemoryInstanceStore,
        Box<dyn AccessPolicy>,
    ),
    Error,
> {
    let dataset = Dataset::from_file(path)?;
    let access = dataset.access_policy();
    let (definitions, store) = dataset.into_services(Arc::new(SystemClock))?;
    Ok((definitions, store, access))
}

fn run_branch(global: &GlobalOpts, args: &BranchArgs) -> ExitCode {
    let ctx = RequestContext::new(&global.user);
    let workspace = match Workspace::open(global, &ctx) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let result = args.scope.filters().and_then(|filters| {
        let request = BranchAnalysisRequest {
            definition_type: args.scope.definition_type(),
            scope: args.scope.scope(),
            gateway: args.gateway.clone(),
            end_event: args.end_event.clone(),
            filters,
        };
        BranchAnalyzer::new(workspace.services(), workspace.loaded.config.scroll.clone())
            .analyze(&ctx, &request)
    });
    finish(global, &ctx, "branch", result, output::summarize_branches)
}

fn run_findings(global: &GlobalOpts, args: &ScopeArgs) -> ExitCode {
    let ctx = RequestContext::new(&global.user);
    let workspace = match Workspace::open(global, &ctx) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let result = args.filters().and_then(|filters| {
        let request = OutlierRequest {
            definition_type: args.definition_type(),
            scope: args.scope(),
            filters,
        };
        OutlierAnalyzer::new(workspace.services(), &workspace.loaded.config)
            .flow_node_outlier_map(&ctx, &request)
    });
    finish(global, &ctx, "outliers findings", result, output::summarize_findings)
}

fn run_chart(global: &GlobalOpts, args: &FlowNodeArgs) -> ExitCode {
    let ctx = RequestContext::new(&global.user);
    let workspace = match Workspace::open(global, &ctx) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let result = args.request().and_then(|request| {
        OutlierAnalyzer::new(workspace.services(), &workspace.loaded.config)
            .count_by_duration_chart(&ctx, &request)
    });
    finish(global, &ctx, "outliers chart", result, |entries| {
        output::summarize_chart(entries)
    })
}

fn run_terms(global: &GlobalOpts, args: &FlowNodeArgs) -> ExitCode {
    let ctx = RequestContext::new(&global.user);
    let workspace = match Workspace::open(global, &ctx) {
        Ok(w) => w,
        Err(code) => return code,
    };
    let result = args.request().and_then(|request| {
        OutlierAnalyzer::new(workspace.services(), &workspace.loaded.config)
            .significant_outlier_variable_terms(&ctx, &request)
    });
    finish(global, &ctx, "outliers terms", result, |terms| {
        output::summarize_terms(terms)
    })
}

/// Print a result (or report its error) and pick the exit code.
fn finish<T: Serialize>(
    global: &GlobalOpts,
    ctx: &RequestContext,
    command: &str,
    result: pa_common::Result<T>,
    summarize: impl Fn(&T) -> Vec<String>,
) -> ExitCode {
    let value = match result {
        Ok(value) => value,
        Err(err) => return report_error(global, Some(ctx), &err),
    };
    match global.format {
        OutputFormat::Json => {
            let envelope = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "command": command,
                "request_id": ctx.log.request_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "result": value,
            });
            print_json(&envelope);
        }
        OutputFormat::Summary => {
            for line in summarize(&value) {
                println!("{line}");
            }
        }
    }
    ExitCode::Clean
}

/// Report an error on stderr in the requested format.
fn report_error(global: &GlobalOpts, ctx: Option<&RequestContext>, err: &Error) -> ExitCode {
    let code = ExitCode::from(err);
    if let Some(ctx) = ctx {
        emit(
            &ctx.log
                .error(event_names::ANALYSIS_FAILED, Stage::Init, err.to_string())
                .with_field("code", err.code())
                .with_field("exit_code", code.code_name()),
        );
    }
    match global.format {
        OutputFormat::Json => {
            let structured =
                StructuredError::from(err).with_context("exit_code", code.code_name());
            eprintln!("{}", structured.to_json());
        }
        OutputFormat::Summary => {
            eprintln!("{}", format_error_human(err, std::io::stderr().is_terminal()));
        }
    }
    code
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

// ============================================================================
// Configuration, schema and version
// ============================================================================

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    let path = match &args.command {
        ConfigCommands::Show => global.config.clone(),
        ConfigCommands::Check { path } => path.clone().or_else(|| global.config.clone()),
    };
    let loaded = match load_config(path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => return report_error(global, None, &Error::Config(e.to_string())),
    };
    let location = loaded.path.as_ref().map(|p| p.display().to_string());

    match (&args.command, global.format) {
        (ConfigCommands::Show, OutputFormat::Json) => print_json(&serde_json::json!({
            "source": loaded.source.to_string(),
            "path": location,
            "config": loaded.config,
        })),
        (ConfigCommands::Check { .. }, OutputFormat::Json) => print_json(&serde_json::json!({
            "status": "valid",
            "source": loaded.source.to_string(),
            "path": location,
            "schema_version": loaded.config.schema_version,
        })),
        (ConfigCommands::Show, OutputFormat::Summary) => {
            println!(
                "config: {} ({})",
                location.as_deref().unwrap_or("built-in defaults"),
                loaded.source
            );
            let outlier = &loaded.config.outlier;
            println!(
                "outlier: k={} alpha={} min_doc_count={} max_terms={} chart_points={}",
                outlier.std_dev_multiplier,
                outlier.significance_level,
                outlier.min_term_doc_count,
                outlier.max_terms_per_variable,
                outlier.chart_target_points
            );
            println!(
                "scroll: page_size={} timeout_ms={}",
                loaded.config.scroll.page_size, loaded.config.scroll.timeout_ms
            );
        }
        (ConfigCommands::Check { .. }, OutputFormat::Summary) => {
            println!("config check: OK ({})", loaded.source);
        }
    }
    ExitCode::Clean
}

fn run_schema(global: &GlobalOpts, args: &SchemaArgs) -> ExitCode {
    if args.list {
        match global.format {
            OutputFormat::Json => {
                let names: Vec<_> = available_schemas()
                    .into_iter()
                    .map(|(name, description)| {
                        serde_json::json!({ "name": name, "description": description })
                    })
                    .collect();
                print_json(&names);
            }
            OutputFormat::Summary => {
                for (name, description) in available_schemas() {
                    println!("{name:<24} {description}");
                }
            }
        }
        return ExitCode::Clean;
    }
    if args.all {
        print_json(&generate_all_schemas());
        return ExitCode::Clean;
    }

    let Some(type_name) = args.type_name.as_deref() else {
        eprintln!("schema: pass a type name, --list or --all");
        return ExitCode::ArgsError;
    };
    match generate_schema(type_name) {
        Some(schema) => {
            print_json(&schema);
            ExitCode::Clean
        }
        None => {
            eprintln!("schema: unknown type '{type_name}' (see --list)");
            ExitCode::ArgsError
        }
    }
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "pa_core": version,
            "schema_version": SCHEMA_VERSION,
            "config_schema_version": CONFIG_SCHEMA_VERSION,
        })),
        OutputFormat::Summary => println!("pa-core {version}"),
    }
}

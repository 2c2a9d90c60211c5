//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use recipeforge_bom::BomDocument;
use recipeforge_core::{
    BomAttacher, BomRequest, BuildProgress, BuildRequest, InsertedComponent, RecipeBuilder,
    RecipeDocument, assemble_bom, describe_for_import, run_build,
};
use recipeforge_shared::{
    AppConfig, MissingPolicy, ResultExt, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RecipeForge: assemble recipe and BOM documents from XML fragments.
#[derive(Parser)]
#[command(
    name = "recipeforge",
    version,
    about = "Assemble wired recipe documents and bills of materials from XML fragment templates.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.recipeforge/recipeforge.toml.
    #[arg(long, global = true, env = "RECIPEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template root directory (overrides `templates.root`).
    #[arg(long, global = true)]
    pub templates: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a recipe from an ordered list of step names.
    Build {
        /// Component names, in process order.
        steps: Vec<String>,

        /// Output path (defaults to `build.output`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Attach an existing BOM document.
        #[arg(long, conflicts_with_all = ["bom_name", "material"])]
        bom_file: Option<PathBuf>,

        /// Assemble and attach a BOM with this id.
        #[arg(long, requires = "material")]
        bom_name: Option<String>,

        /// Material id for the assembled BOM (repeatable).
        #[arg(short, long)]
        material: Vec<String>,

        /// JSON material catalog for the assembled BOM.
        #[arg(long, requires = "material")]
        materials: Option<PathBuf>,

        /// Also write the assembled BOM here.
        #[arg(long, requires = "material")]
        bom_out: Option<PathBuf>,

        /// What to do with unknown step names: skip or abort.
        #[arg(long)]
        on_missing: Option<MissingPolicy>,
    },

    /// Assemble a standalone BOM document.
    Bom {
        /// BOM id (generated when omitted).
        #[arg(short, long)]
        name: Option<String>,

        /// Material id (repeatable, at least one).
        #[arg(short, long, required = true)]
        material: Vec<String>,

        /// JSON material catalog.
        #[arg(long)]
        materials: Option<PathBuf>,

        /// Output path.
        #[arg(short, long)]
        out: PathBuf,

        /// What to do with unknown material ids: skip or abort.
        #[arg(long)]
        on_missing: Option<MissingPolicy>,
    },

    /// Attach a BOM document to an existing recipe.
    Attach {
        /// Recipe document to attach to.
        #[arg(long)]
        recipe: PathBuf,

        /// BOM document to attach.
        #[arg(long)]
        bom: PathBuf,

        /// Output path (defaults to rewriting the recipe in place).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the registered components.
    Components,

    /// Print the import descriptor of a document as JSON.
    Describe {
        /// Document to describe.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "recipeforge=info",
        1 => "recipeforge=debug",
        _ => "recipeforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        };
    }

    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Build {
            steps,
            out,
            bom_file,
            bom_name,
            material,
            materials,
            bom_out,
            on_missing,
        } => {
            let bom = match bom_file {
                Some(path) => Some(BomRequest::Existing(path)),
                None if material.is_empty() => None,
                None => Some(BomRequest::Assemble {
                    name: bom_name,
                    materials: material,
                    catalog: materials,
                    output: bom_out,
                }),
            };
            let request = BuildRequest {
                steps,
                output: out.unwrap_or_else(|| config.build.output.clone()),
                bom,
            };
            cmd_build(&config, &request, on_missing)
        }
        Command::Bom {
            name,
            material,
            materials,
            out,
            on_missing,
        } => {
            let mut config = config;
            if let Some(policy) = on_missing {
                config.bom.missing_material = policy;
            }
            cmd_bom(&config, name.as_deref(), &material, materials.as_deref(), &out)
        }
        Command::Attach { recipe, bom, out } => {
            cmd_attach(&config, &recipe, &bom, out.as_deref().unwrap_or(&recipe))
        }
        Command::Components => cmd_components(&config),
        Command::Describe { file } => cmd_describe(&config, &file),
        Command::Config { .. } => Ok(()),
    }
}

/// Load the config file (or defaults) and apply global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(root) = &cli.templates {
        config.templates.root = root.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(config: &AppConfig, request: &BuildRequest, on_missing: Option<MissingPolicy>) -> Result<()> {
    let policy = on_missing.unwrap_or(config.build.missing_component);
    let builder = RecipeBuilder::new(config).with_missing_policy(policy);

    info!(
        steps = request.steps.len(),
        output = %request.output.display(),
        %policy,
        "building recipe"
    );

    let reporter = CliProgress::new();
    let result = run_build(config, &builder, request, &reporter);
    reporter.finish();
    let report = result?;

    println!();
    println!("  Recipe built successfully!");
    println!("  Operation:  {}", report.operation_guid);
    println!("  Components: {}", report.components);
    if !report.skipped_components.is_empty() {
        println!("  Skipped:    {}", report.skipped_components.join(", "));
    }
    if let Some(attachment) = &report.attachment {
        let action = if attachment.replaced { "replaced" } else { "attached" };
        println!("  BOM:        {} ({action})", attachment.bom_id);
    }
    if !report.skipped_materials.is_empty() {
        println!("  Missing:    {}", report.skipped_materials.join(", "));
    }
    println!("  Path:       {}", report.output.display());
    println!("  SHA-256:    {}", report.descriptor.sha256);
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_bom(
    config: &AppConfig,
    name: Option<&str>,
    materials: &[String],
    catalog: Option<&Path>,
    out: &Path,
) -> Result<()> {
    info!(materials = materials.len(), out = %out.display(), "assembling BOM");

    let outcome = assemble_bom(config, name, materials, catalog)?;
    outcome.bom.write(out)?;

    println!();
    println!("  BOM assembled successfully!");
    println!("  ID:        {}", outcome.bom.bom_id());
    println!("  Materials: {}", outcome.bom.material_ids().len());
    if !outcome.skipped.is_empty() {
        println!("  Missing:   {}", outcome.skipped.join(", "));
    }
    println!("  Path:      {}", out.display());
    println!();

    Ok(())
}

fn cmd_attach(config: &AppConfig, recipe_path: &Path, bom_path: &Path, out: &Path) -> Result<()> {
    let mut recipe = RecipeDocument::from_path(recipe_path, config.build.operation_obj_type.as_str())?;
    let bom = BomDocument::from_path(bom_path)?;

    let outcome = BomAttacher::from_config(config).attach(&mut recipe, &bom)?;
    recipe
        .write(out)
        .while_processing(|| format!("recipe output {}", out.display()))?;

    let action = if outcome.replaced { "Replaced" } else { "Attached" };
    println!("{action} BOM '{}' → {}", outcome.bom_id, out.display());
    Ok(())
}

fn cmd_components(config: &AppConfig) -> Result<()> {
    let builder = RecipeBuilder::new(config);
    let registry = builder.registry();

    let width = registry.entries().map(|c| c.name.len()).max().unwrap_or(0);
    for component in registry.entries() {
        let status = if component.location.exists() { "" } else { "  (missing)" };
        println!(
            "{:<width$}  {:<4}  {}{status}",
            component.name,
            component.category.to_string(),
            component.description,
        );
    }
    Ok(())
}

fn cmd_describe(config: &AppConfig, file: &Path) -> Result<()> {
    let descriptor = describe_for_import(file, &config.bom)?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BuildProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn step_inserted(&self, component: &InsertedComponent, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Placing [{current}/{total}] {} at ({}, {})",
            component.name, component.position.x, component.position.y
        ));
    }

    fn step_skipped(&self, name: &str) {
        self.spinner.println(format!("  skipped unknown step '{name}'"));
    }
}

use crate::provider::{SecretsProvider, providers};
use crate::{
    Environment, FailurePolicy, GlobalConfig, GlobalDefaults, Guidance, LayerStore, LoadReport,
    LoadRequest, Loader, MemoryEnvironment, Origin, ProcessEnvironment, ProjectsFile,
};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use tracing_subscriber::EnvFilter;

/// Values longer than this are shortened in tables.
const DISPLAY_WIDTH: usize = 24;

/// Main CLI structure for the envlayer application.
#[derive(Parser)]
#[command(name = "envlayer")]
#[command(about = "Layered environment profiles with secrets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that resolves a profile.
#[derive(Args, Clone)]
struct LoadArgs {
    /// Profile to load
    #[arg(short = 'P', long, env = "ENVLAYER_PROFILE")]
    profile: Option<String>,
    /// Profile to publish under TARGET_*
    #[arg(short, long, env = "ENVLAYER_SIDE_LOAD")]
    side_load: Option<String>,
    /// Secrets provider URI (e.g., keyring://, dotenv:.secrets.env)
    #[arg(short, long, env = "ENVLAYER_PROVIDER")]
    provider: Option<String>,
    /// Layer documents, merged in order
    #[arg(short, long, env = "ENVLAYER_DOCUMENTS", value_delimiter = ',')]
    documents: Vec<PathBuf>,
    /// Project alias mapping file
    #[arg(long, env = "ENVLAYER_PROJECTS_FILE")]
    projects_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved variables of a profile without applying them
    Show {
        #[command(flatten)]
        load: LoadArgs,
        /// Leave unresolvable variables out instead of failing
        #[arg(long)]
        permissive: bool,
        /// Print secret values instead of masking them
        #[arg(long)]
        reveal: bool,
    },
    /// Check that every variable of a profile resolves
    Check {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Run a command with the profile loaded into its environment
    Run {
        #[command(flatten)]
        load: LoadArgs,
        /// Leave unresolvable variables out instead of failing
        #[arg(long)]
        permissive: bool,
        /// Command and arguments to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Read or write secrets in the configured provider
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Register or list project aliases used by `$.projects.<alias>`
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Init or show ~/.config/envlayer/config.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Store a secret
    Set {
        /// Name of the secret (as written after `secret:`)
        name: String,
        /// Value of the secret (will prompt if not provided)
        value: Option<String>,
        /// Secrets provider URI
        #[arg(short, long, env = "ENVLAYER_PROVIDER")]
        provider: Option<String>,
    },
    /// Print a secret
    Get {
        /// Name of the secret
        name: String,
        /// Secrets provider URI
        #[arg(short, long, env = "ENVLAYER_PROVIDER")]
        provider: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Map an alias to a project id, replacing any previous mapping
    Set {
        /// Alias as written after `$.projects.`
        alias: String,
        /// Project id the alias resolves to
        project_id: String,
        /// Project alias mapping file
        #[arg(long, env = "ENVLAYER_PROJECTS_FILE")]
        projects_file: Option<PathBuf>,
    },
    /// List registered aliases
    List {
        /// Project alias mapping file
        #[arg(long, env = "ENVLAYER_PROJECTS_FILE")]
        projects_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize user configuration
    Init,
    /// Show current configuration
    Show,
}

/// Settings after merging flags, environment and the user configuration.
struct Settings {
    profile: String,
    side_load: Option<String>,
    provider: Option<String>,
    documents: Vec<PathBuf>,
    projects_file: PathBuf,
}

impl Settings {
    fn resolve(args: LoadArgs, config: &GlobalConfig) -> Result<Self> {
        let defaults = &config.defaults;
        let profile = args.profile.or_else(|| defaults.profile.clone()).ok_or_else(|| {
            eyre!("No profile given. Use --profile or set a default with 'envlayer config init'")
        })?;

        let documents = if args.documents.is_empty() {
            config.documents()
        } else {
            args.documents
        };

        Ok(Self {
            profile,
            side_load: args.side_load,
            provider: args.provider.or_else(|| defaults.provider.clone()),
            documents,
            projects_file: projects_file(args.projects_file, config),
        })
    }

    fn request(&self, policy: FailurePolicy) -> LoadRequest {
        let request = LoadRequest::new(&self.profile).policy(policy);
        match &self.side_load {
            Some(side_load) => request.side_load(side_load),
            None => request,
        }
    }

    fn loader<E: Environment>(&self, env: E) -> Result<Loader<E>> {
        let store = LayerStore::from_paths(&self.documents)
            .map_err(crate::EnvLayerError::from)
            .wrap_err("Failed to read layer documents")?;

        let mut loader = Loader::with_environment(store, env)
            .with_projects(Box::new(ProjectsFile::new(&self.projects_file)));
        if let Some(uri) = &self.provider {
            loader = loader.with_secrets(provider(uri)?);
        }
        Ok(loader)
    }
}

fn projects_file(flag: Option<PathBuf>, config: &GlobalConfig) -> PathBuf {
    flag.or_else(|| config.defaults.projects_file.clone())
        .unwrap_or_else(|| PathBuf::from(crate::projects::DEFAULT_PROJECTS_FILE))
}

/// Aliases must round-trip through `.projects` and `$.projects.<alias>`.
fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty()
        && !alias
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '=' | '#' | '.'))
}

fn provider(uri: &str) -> Result<Box<dyn SecretsProvider>> {
    Box::<dyn SecretsProvider>::try_from(uri)
        .wrap_err_with(|| format!("Failed to set up provider '{}'", uri))
}

fn global_config() -> Result<GlobalConfig> {
    Ok(GlobalConfig::load()
        .wrap_err("Failed to read user configuration")?
        .unwrap_or_default())
}

/// Loads a profile, printing guidance to stderr when it fails.
fn load<E: Environment>(loader: &mut Loader<E>, request: &LoadRequest) -> Result<LoadReport> {
    loader.load(request).map_err(|err| {
        if let Some(failure) = err.failure() {
            let guidance = match &err {
                crate::EnvLayerError::Unresolved(unresolved) => Guidance::for_variable(unresolved),
                _ => Guidance::for_failure(failure),
            };
            eprintln!("{}", guidance);
        }
        eyre!(err)
    })
}

/// A dry-run environment seeded with the current process environment, so
/// pre-existing variables are detected without writing anything.
fn dry_run_environment() -> MemoryEnvironment {
    ProcessEnvironment.snapshot().into_iter().collect()
}

fn truncate(value: &str) -> String {
    if value.chars().count() > DISPLAY_WIDTH {
        let head: String = value.chars().take(DISPLAY_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

fn print_report(report: &LoadReport, reveal: bool) {
    let width = report
        .variables
        .names()
        .map(str::len)
        .max()
        .unwrap_or(0);

    for (name, variable) in &report.variables {
        let value = match variable.origin {
            Origin::ResolvedSecret if !reveal => "********".to_string(),
            _ => truncate(&variable.value),
        };
        println!(
            "{}  {:value_width$}  {}",
            format!("{:width$}", name, width = width).bold(),
            value,
            variable.origin.to_string().dimmed(),
            value_width = DISPLAY_WIDTH
        );
    }

    for failure in &report.failures {
        println!(
            "{}  {}",
            format!("{:width$}", failure.variable, width = width).red(),
            failure.failure.kind().to_string().red()
        );
    }

    for cycle in &report.cycles {
        eprintln!("{} {}", "warning:".yellow(), cycle);
    }
    for name in &report.collisions {
        eprintln!(
            "{} side-loaded {} dropped, the primary profile defines it",
            "warning:".yellow(),
            name
        );
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ENVLAYER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Main entry point for the envlayer CLI application.
pub fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show {
            load: args,
            permissive,
            reveal,
        } => {
            let settings = Settings::resolve(args, &global_config()?)?;
            let policy = if permissive {
                FailurePolicy::Permissive
            } else {
                FailurePolicy::Strict
            };

            let mut loader = settings.loader(dry_run_environment())?;
            let report = load(&mut loader, &settings.request(policy))?;
            print_report(&report, reveal);
            Ok(())
        }
        Commands::Check { load: args } => {
            let settings = Settings::resolve(args, &global_config()?)?;
            let mut loader = settings.loader(dry_run_environment())?;
            let report = load(&mut loader, &settings.request(FailurePolicy::Permissive))?;

            println!(
                "Checking profile {} using {}...\n",
                settings.profile.cyan(),
                loader.secrets().name().blue()
            );
            for (name, variable) in &report.variables {
                println!("{} {} ({})", "✓".green(), name, variable.origin);
            }
            for failure in &report.failures {
                println!();
                print!("{}", Guidance::for_variable(failure));
            }

            let total = report.variables.len() + report.failures.len();
            println!(
                "\nSummary: {}/{} variables resolved",
                report.variables.len(),
                total
            );
            if report.failures.is_empty() {
                Ok(())
            } else {
                Err(eyre!(
                    "{} variable(s) could not be resolved",
                    report.failures.len()
                ))
            }
        }
        Commands::Run {
            load: args,
            permissive,
            command,
        } => {
            let settings = Settings::resolve(args, &global_config()?)?;
            let policy = if permissive {
                FailurePolicy::Permissive
            } else {
                FailurePolicy::Strict
            };

            // Child processes inherit the loaded environment
            let mut loader = settings.loader(ProcessEnvironment)?;
            load(&mut loader, &settings.request(policy))?;

            let (program, args) = command
                .split_first()
                .ok_or_else(|| eyre!("No command specified. Usage: envlayer run -- <command>"))?;
            let status = Command::new(program)
                .args(args)
                .status()
                .wrap_err_with(|| format!("Failed to run '{}'", program))?;
            std::process::exit(status.code().unwrap_or(1));
        }
        Commands::Secret { action } => match action {
            SecretAction::Set {
                name,
                value,
                provider: uri,
            } => {
                let uri = uri
                    .or(global_config()?.defaults.provider)
                    .ok_or_else(|| eyre!("No provider given. Use --provider or run 'envlayer config init'"))?;
                let backend = provider(&uri)?;
                if !backend.allows_set() {
                    return Err(eyre!(
                        "Provider '{}' is read-only and does not support setting values",
                        backend.name()
                    ));
                }

                let value = match value {
                    Some(v) => v,
                    None => {
                        print!("Enter value for {}: ", name);
                        io::stdout().flush()?;
                        rpassword::read_password()?
                    }
                };

                backend.set(&name, &value)?;
                println!(
                    "{} Secret '{}' saved to {}",
                    "✓".green(),
                    name,
                    backend.name()
                );
                Ok(())
            }
            SecretAction::Get {
                name,
                provider: uri,
            } => {
                let uri = uri
                    .or(global_config()?.defaults.provider)
                    .ok_or_else(|| eyre!("No provider given. Use --provider or run 'envlayer config init'"))?;
                let backend = provider(&uri)?;
                match backend.get(&name) {
                    Ok(Some(value)) => {
                        println!("{}", value);
                        Ok(())
                    }
                    Ok(None) => Err(eyre!("Secret '{}' not found in {}", name, backend.name())),
                    Err(e) => Err(e).wrap_err_with(|| format!("Failed to read '{}'", name)),
                }
            }
        },
        Commands::Project { action } => match action {
            ProjectAction::Set {
                alias,
                project_id,
                projects_file: path,
            } => {
                if !is_valid_alias(&alias) {
                    return Err(eyre!(
                        "Invalid alias '{}': it must be non-empty without whitespace, '=', '#' or '.'",
                        alias
                    ));
                }
                let file = ProjectsFile::new(projects_file(path, &global_config()?));
                file.set(&alias, &project_id)
                    .wrap_err_with(|| format!("Failed to update {}", file.path().display()))?;
                println!(
                    "{} Registered {}={} in {}",
                    "✓".green(),
                    alias,
                    project_id,
                    file.path().display()
                );
                Ok(())
            }
            ProjectAction::List { projects_file: path } => {
                let file = ProjectsFile::new(projects_file(path, &global_config()?));
                let map = file.read().map_err(|e| eyre!(e))?;
                if map.is_empty() {
                    println!("No aliases registered in {}", file.path().display());
                }
                for (alias, project_id) in map.iter() {
                    println!("{}  {}", alias.bold(), project_id);
                }
                Ok(())
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Init => {
                use inquire::{Select, Text};

                let provider_choices: Vec<String> = providers()
                    .into_iter()
                    .map(|info| info.display_with_examples())
                    .collect();
                let selected_choice =
                    Select::new("Select your preferred secrets provider:", provider_choices)
                        .prompt()?;
                let provider = selected_choice.split(':').next().unwrap_or("keyring");

                let profile = Text::new("Default profile (leave empty for none):")
                    .with_help_message("'dev' is common for local development")
                    .prompt()?;
                let profile = Some(profile.trim().to_string()).filter(|p| !p.is_empty());

                let mut config = GlobalConfig::load()?.unwrap_or_default();
                config.defaults = GlobalDefaults {
                    provider: Some(format!("{}://", provider)),
                    profile,
                    ..config.defaults
                };

                config.save()?;
                println!(
                    "\n{} Configuration saved to {}",
                    "✓".green(),
                    GlobalConfig::path()?.display()
                );
                Ok(())
            }
            ConfigAction::Show => {
                match GlobalConfig::load()? {
                    Some(config) => {
                        println!("Configuration file: {}\n", GlobalConfig::path()?.display());
                        let defaults = &config.defaults;
                        match &defaults.provider {
                            Some(provider) => println!("Provider:      {}", provider),
                            None => println!("Provider:      (none)"),
                        }
                        match &defaults.profile {
                            Some(profile) => println!("Profile:       {}", profile),
                            None => println!("Profile:       (none)"),
                        }
                        let documents: Vec<String> = config
                            .documents()
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect();
                        println!("Documents:     {}", documents.join(", "));
                        match &defaults.projects_file {
                            Some(path) => println!("Projects file: {}", path.display()),
                            None => println!(
                                "Projects file: {} (default)",
                                crate::projects::DEFAULT_PROJECTS_FILE
                            ),
                        }
                    }
                    None => {
                        println!(
                            "No configuration found. Run 'envlayer config init' to create one."
                        );
                    }
                }
                Ok(())
            }
        },
    }
}

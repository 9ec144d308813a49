use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use crud_generator::config::{resolve_project_root, write_default_config};
use crud_generator::scaffold::{self, GenerateRequest};
use crud_generator::types::{BehaviorFlags, Domain};
use crud_generator::GeneratorError;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for command-line usage mistakes, shared with validation errors.
const USAGE_EXIT: u8 = 1;

#[derive(Parser)]
#[command(name = "crud-generate", version)]
#[command(about = "Scaffold a CRUD entity: model, service, schemas, router, tests and migration")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the artifacts for one entity.
    Generate(GenerateArgs),
    /// Write a default crud-generate.toml into the project root.
    InitConfig {
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the generator version.
    Version,
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// snake_case entity name, e.g. `work_log`.
    entity_name: String,
    /// Field spec: `name:type[:constraint...]`, comma separated.
    #[arg(long, default_value = "")]
    fields: String,
    #[arg(long, value_enum, default_value_t = DomainArg::Generic)]
    domain: DomainArg,
    #[arg(long = "soft-delete", overrides_with = "no_soft_delete")]
    soft_delete: bool,
    #[arg(long = "no-soft-delete", overrides_with = "soft_delete")]
    no_soft_delete: bool,
    #[arg(long = "timestamps", overrides_with = "no_timestamps")]
    timestamps: bool,
    #[arg(long = "no-timestamps", overrides_with = "timestamps")]
    no_timestamps: bool,
    #[arg(long = "audit", overrides_with = "no_audit")]
    audit: bool,
    #[arg(long = "no-audit", overrides_with = "audit")]
    no_audit: bool,
    /// Project root; defaults to `.` or `./backend`, whichever contains `app/`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Print the manifest and previews without writing anything.
    #[arg(long)]
    dry_run: bool,
    /// Project-relative path write mode may replace. Repeatable.
    #[arg(long = "allow-overwrite")]
    allow_overwrite: Vec<PathBuf>,
    /// Lines of each artifact shown in the dry-run manifest.
    #[arg(long)]
    preview_lines: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DomainArg {
    Generic,
    Employee,
    Customer,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Generic => Domain::Generic,
            DomainArg::Employee => Domain::Employee,
            DomainArg::Customer => Domain::Customer,
        }
    }
}

impl GenerateArgs {
    fn into_request(self) -> GenerateRequest {
        // Each pair defaults to on; the later flag of a pair wins.
        let behavior = BehaviorFlags {
            soft_delete: self.soft_delete || !self.no_soft_delete,
            timestamps: self.timestamps || !self.no_timestamps,
            audit: self.audit || !self.no_audit,
        };

        GenerateRequest {
            entity_name: self.entity_name,
            fields: self.fields,
            domain: self.domain.into(),
            behavior,
            output_dir: self.output_dir,
            dry_run: self.dry_run,
            allow_overwrite: self.allow_overwrite,
            preview_lines: self.preview_lines,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print!("{err}");
                    ExitCode::SUCCESS
                }
                _ => {
                    eprint!("{err}");
                    ExitCode::from(USAGE_EXIT)
                }
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(command: Command) -> Result<(), GeneratorError> {
    let cwd = env::current_dir().map_err(|err| GeneratorError::io(".", err))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Generate(args) => {
            scaffold::run(&args.into_request(), &cwd, &mut out)?;
        }
        Command::InitConfig { output_dir } => {
            let root = resolve_project_root(output_dir.as_deref(), &cwd)?;
            let path = write_default_config(&root)?;
            writeln!(out, "wrote {}", path.display()).map_err(|err| GeneratorError::io("<stdout>", err))?;
        }
        Command::Version => {
            writeln!(out, "crud-generate {}", env!("CARGO_PKG_VERSION"))
                .map_err(|err| GeneratorError::io("<stdout>", err))?;
        }
    }

    Ok(())
}

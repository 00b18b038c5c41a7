use crate::commands::{
    self, ApplyArgs, BookArgs, BookingsArgs, DecideCommand, EnquiryCommand, LoginArgs,
    ProjectCommand, ProjectsArgs, RegisterArgs, WithdrawArgs,
};
use crate::server;
use bto_allocation::config::AppConfig;
use bto_allocation::error::AppError;
use bto_allocation::telemetry;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bto-desk",
    about = "Run the BTO allocation desk from the command line or over HTTP",
    version
)]
struct Cli {
    /// Directory holding the CSV collections (overrides APP_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Reconcile derived state and print the repair report
    Sync,
    /// Check a credential and show the user it belongs to
    Login(LoginArgs),
    /// List the projects a user may see
    Projects(ProjectsArgs),
    /// Create, edit, hide, or delete projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Apply for a flat
    Apply(ApplyArgs),
    /// Ask to withdraw an application
    Withdraw(WithdrawArgs),
    /// Approve or reject a pending request
    Decide {
        #[command(subcommand)]
        command: DecideCommand,
    },
    /// Book a flat for a successful applicant
    Book(BookArgs),
    /// Register an officer to handle a project
    Register(RegisterArgs),
    /// Submit, answer, or list enquiries
    Enquiry {
        #[command(subcommand)]
        command: EnquiryCommand,
    },
    /// Report confirmed bookings across a manager's projects
    Bookings(BookingsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    telemetry::init(&config.telemetry)?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(config, args).await,
        Command::Sync => commands::sync(&config),
        Command::Login(args) => commands::login(&config, args),
        Command::Projects(args) => commands::projects(&config, args),
        Command::Project { command } => commands::project(&config, command),
        Command::Apply(args) => commands::apply(&config, args),
        Command::Withdraw(args) => commands::withdraw(&config, args),
        Command::Decide { command } => commands::decide(&config, command),
        Command::Book(args) => commands::book(&config, args),
        Command::Register(args) => commands::register(&config, args),
        Command::Enquiry { command } => commands::enquiry(&config, command),
        Command::Bookings(args) => commands::bookings(&config, args),
    }
}

use crate::infra::{
    parse_date, parse_decision, parse_flat_amount, parse_flat_draft, parse_flat_type,
    parse_identity, parse_marital_status, parse_project, today_or_now, UserView,
};
use bto_allocation::allocation::{
    AllocationDesk, BookingFilter, Decision, EnquiryId, FlatDraft, FlatType, Identity,
    MaritalStatus, ProjectDraft, ProjectFilter, ProjectName, ProjectUpdate,
};
use bto_allocation::config::AppConfig;
use bto_allocation::error::AppError;
use bto_allocation::storage::CsvStore;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::warn;

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    /// NRIC of the user logging in
    #[arg(long)]
    pub(crate) identity: String,
    #[arg(long)]
    pub(crate) password: String,
}

#[derive(Args, Debug)]
pub(crate) struct ProjectsArgs {
    /// NRIC of the viewing user
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long)]
    pub(crate) neighborhood: Option<String>,
    #[arg(long, value_parser = parse_flat_type)]
    pub(crate) flat_type: Option<FlatType>,
    /// Keep projects whose window includes this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) open_on: Option<NaiveDate>,
    /// Managers only: list the projects they own
    #[arg(long)]
    pub(crate) managed_only: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProjectCommand {
    /// Create a hidden or visible project
    Create(CreateProjectArgs),
    /// Edit an owned project; omitted fields stay as they are
    Update(UpdateProjectArgs),
    /// Show or hide an owned project
    Visibility(VisibilityArgs),
    /// Delete an owned project under the configured deletion policy
    Delete(ProjectRef),
}

#[derive(Args, Debug)]
pub(crate) struct CreateProjectArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long)]
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) neighborhood: String,
    /// TYPE:UNITS:PRICE, repeatable (e.g. 2-Room:10:350000)
    #[arg(long = "flat", value_parser = parse_flat_draft, required = true)]
    pub(crate) flats: Vec<FlatDraft>,
    #[arg(long, value_parser = parse_date)]
    pub(crate) open: NaiveDate,
    #[arg(long, value_parser = parse_date)]
    pub(crate) close: NaiveDate,
    #[arg(long)]
    pub(crate) officer_slots: u8,
    #[arg(long)]
    pub(crate) visible: bool,
}

#[derive(Args, Debug)]
pub(crate) struct UpdateProjectArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long)]
    pub(crate) neighborhood: Option<String>,
    #[arg(long, value_parser = parse_date)]
    pub(crate) open: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    pub(crate) close: Option<NaiveDate>,
    #[arg(long)]
    pub(crate) officer_slots: Option<u8>,
    /// TYPE:TOTAL, repeatable
    #[arg(long = "units", value_parser = parse_flat_amount::<u32>)]
    pub(crate) units: Vec<(FlatType, u32)>,
    /// TYPE:PRICE, repeatable
    #[arg(long = "price", value_parser = parse_flat_amount::<u64>)]
    pub(crate) prices: Vec<(FlatType, u64)>,
}

#[derive(Args, Debug)]
pub(crate) struct VisibilityArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long, action = ArgAction::Set)]
    pub(crate) visible: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ProjectRef {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
}

#[derive(Args, Debug)]
pub(crate) struct ApplyArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long, value_parser = parse_flat_type)]
    pub(crate) flat_type: FlatType,
    /// Evaluation date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) type WithdrawArgs = ProjectRef;

#[derive(Subcommand, Debug)]
pub(crate) enum DecideCommand {
    /// Approve or reject a pending application
    Application(ApplicantDecisionArgs),
    /// Approve or reject a pending withdrawal
    Withdrawal(ApplicantDecisionArgs),
    /// Approve or reject an officer registration
    Registration(OfficerDecisionArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ApplicantDecisionArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_identity)]
    pub(crate) applicant: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    /// approve or reject
    #[arg(long, value_parser = parse_decision)]
    pub(crate) decision: Decision,
}

#[derive(Args, Debug)]
pub(crate) struct OfficerDecisionArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_identity)]
    pub(crate) officer: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long, value_parser = parse_decision)]
    pub(crate) decision: Decision,
}

#[derive(Args, Debug)]
pub(crate) struct BookArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_identity)]
    pub(crate) applicant: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: ProjectName,
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum EnquiryCommand {
    /// Ask a question about a project
    Submit {
        #[arg(long = "as", value_parser = parse_identity)]
        actor: Identity,
        /// Project name; need not exist yet
        #[arg(long)]
        project: String,
        #[arg(long)]
        text: String,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// Change the text of an unanswered enquiry
    Edit {
        #[arg(long = "as", value_parser = parse_identity)]
        actor: Identity,
        #[arg(long, value_parser = EnquiryId::parse)]
        id: EnquiryId,
        #[arg(long)]
        text: String,
    },
    /// Remove an unanswered enquiry
    Delete {
        #[arg(long = "as", value_parser = parse_identity)]
        actor: Identity,
        #[arg(long, value_parser = EnquiryId::parse)]
        id: EnquiryId,
    },
    /// Answer an enquiry
    Reply {
        #[arg(long = "as", value_parser = parse_identity)]
        actor: Identity,
        #[arg(long, value_parser = EnquiryId::parse)]
        id: EnquiryId,
        #[arg(long)]
        text: String,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// List the enquiries a user may see
    List {
        #[arg(long = "as", value_parser = parse_identity)]
        actor: Identity,
    },
}

#[derive(Args, Debug)]
pub(crate) struct BookingsArgs {
    #[arg(long = "as", value_parser = parse_identity)]
    pub(crate) actor: Identity,
    #[arg(long, value_parser = parse_marital_status)]
    pub(crate) marital_status: Option<MaritalStatus>,
    #[arg(long, value_parser = parse_flat_type)]
    pub(crate) flat_type: Option<FlatType>,
    #[arg(long, value_parser = parse_project)]
    pub(crate) project: Option<ProjectName>,
}

fn open_desk(config: &AppConfig) -> Result<AllocationDesk<CsvStore>, AppError> {
    let store = Arc::new(CsvStore::new(&config.storage.data_dir));
    let (desk, report) = AllocationDesk::open(store, config.policy)?;
    if !report.warnings.is_empty() {
        warn!(
            warnings = report.warnings.len(),
            "dataset drift found; run `bto-desk sync` for details"
        );
    }
    Ok(desk)
}

fn emit<T: Serialize>(value: &T) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).map_err(io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

pub(crate) fn sync(config: &AppConfig) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    emit(&desk.synchronize()?)
}

pub(crate) fn login(config: &AppConfig, args: LoginArgs) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    let user = desk.login(&args.identity, &args.password)?;
    emit(&UserView::from(&user))
}

pub(crate) fn projects(config: &AppConfig, args: ProjectsArgs) -> Result<(), AppError> {
    let desk = open_desk(config)?;
    let filter = ProjectFilter {
        neighborhood: args.neighborhood,
        flat_type: args.flat_type,
        open_on: args.open_on,
        managed_only: args.managed_only,
    };
    emit(&desk.projects_for(&args.actor, &filter)?)
}

pub(crate) fn project(config: &AppConfig, command: ProjectCommand) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    match command {
        ProjectCommand::Create(args) => {
            let draft = ProjectDraft {
                name: args.name,
                neighborhood: args.neighborhood,
                flats: args.flats,
                open: args.open,
                close: args.close,
                officer_slots: args.officer_slots,
                visible: args.visible,
            };
            emit(&desk.create_project(&args.actor, draft)?)
        }
        ProjectCommand::Update(args) => {
            let update = ProjectUpdate {
                neighborhood: args.neighborhood,
                open: args.open,
                close: args.close,
                officer_slots: args.officer_slots,
                units: args.units.into_iter().collect(),
                prices: args.prices.into_iter().collect(),
            };
            emit(&desk.update_project(&args.actor, &args.project, update)?)
        }
        ProjectCommand::Visibility(args) => {
            emit(&desk.set_visibility(&args.actor, &args.project, args.visible)?)
        }
        ProjectCommand::Delete(args) => emit(&desk.delete_project(&args.actor, &args.project)?),
    }
}

pub(crate) fn apply(config: &AppConfig, args: ApplyArgs) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    let application = desk.apply(
        &args.actor,
        &args.project,
        args.flat_type,
        today_or_now(args.today),
    )?;
    emit(&application)
}

pub(crate) fn withdraw(config: &AppConfig, args: WithdrawArgs) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    emit(&desk.request_withdrawal(&args.actor, &args.project)?)
}

pub(crate) fn decide(config: &AppConfig, command: DecideCommand) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    match command {
        DecideCommand::Application(args) => emit(&desk.decide_application(
            &args.actor,
            &args.applicant,
            &args.project,
            args.decision,
        )?),
        DecideCommand::Withdrawal(args) => emit(&desk.decide_withdrawal(
            &args.actor,
            &args.applicant,
            &args.project,
            args.decision,
        )?),
        DecideCommand::Registration(args) => emit(&desk.decide_registration(
            &args.actor,
            &args.officer,
            &args.project,
            args.decision,
        )?),
    }
}

pub(crate) fn book(config: &AppConfig, args: BookArgs) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    let receipt = desk.book(
        &args.actor,
        &args.applicant,
        &args.project,
        today_or_now(args.today),
    )?;
    emit(&receipt)
}

pub(crate) fn register(config: &AppConfig, args: RegisterArgs) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    emit(&desk.register(&args.actor, &args.project, today_or_now(args.today))?)
}

pub(crate) fn enquiry(config: &AppConfig, command: EnquiryCommand) -> Result<(), AppError> {
    let mut desk = open_desk(config)?;
    match command {
        EnquiryCommand::Submit {
            actor,
            project,
            text,
            today,
        } => emit(&desk.submit_enquiry(&actor, &project, &text, today_or_now(today))?),
        EnquiryCommand::Edit { actor, id, text } => emit(&desk.edit_enquiry(&actor, id, &text)?),
        EnquiryCommand::Delete { actor, id } => emit(&desk.delete_enquiry(&actor, id)?),
        EnquiryCommand::Reply {
            actor,
            id,
            text,
            today,
        } => emit(&desk.reply_enquiry(&actor, id, &text, today_or_now(today))?),
        EnquiryCommand::List { actor } => emit(&desk.enquiries_for(&actor)?),
    }
}

pub(crate) fn bookings(config: &AppConfig, args: BookingsArgs) -> Result<(), AppError> {
    let desk = open_desk(config)?;
    let filter = BookingFilter {
        marital_status: args.marital_status,
        flat_type: args.flat_type,
        project: args.project,
    };
    emit(&desk.booking_report(&args.actor, &filter)?)
}

//! `procure` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `procure_core` services.
//! - Print every result as pretty JSON on stdout; errors go to stderr.
//!
//! # Invariants
//! - The acting user is always taken from `--actor`; no credentials are
//!   handled here.
//! - Exit code is non-zero whenever a command fails.

mod error;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use log::info;
use procure_core::config::AppConfig;
use procure_core::db::{open_db, Connection};
use procure_core::model::directory::{NewUser, Role, SupplierInput};
use procure_core::model::item::NewItem;
use procure_core::model::purchase_order::{parse_po_number, CreatePoRequest, UpdateLinesRequest};
use procure_core::model::status::{PoStatus, WorkflowAction};
use procure_core::money::Money;
use procure_core::repo::directory_repo::{SupplierListQuery, UserListQuery};
use procure_core::repo::po_repo::PoListQuery;
use procure_core::service::approval_service::ApprovalService;
use procure_core::service::dashboard_service::{DashboardCache, DashboardService};
use procure_core::service::directory_service::DirectoryService;
use procure_core::service::maintenance_service::MaintenanceService;
use procure_core::service::po_service::PurchaseOrderService;
use procure_core::service::settings_service::SettingsService;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "procure", version, about = "Purchase-order management")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path; overrides the configuration file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Id of the user performing the command.
    #[arg(long, global = true)]
    actor: Option<Uuid>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the database and optionally bootstrap a superadmin.
    Init {
        #[arg(long, requires = "admin_email")]
        admin_name: Option<String>,
        #[arg(long, requires = "admin_name")]
        admin_email: Option<String>,
    },
    /// Departments.
    #[command(subcommand)]
    Dept(DeptCommand),
    /// User accounts and roles.
    #[command(subcommand)]
    User(UserCommand),
    /// Suppliers.
    #[command(subcommand)]
    Supplier(SupplierCommand),
    /// Catalog items and price history.
    #[command(subcommand)]
    Item(ItemCommand),
    /// Purchase orders.
    #[command(subcommand)]
    Po(PoCommand),
    /// Move a purchase order through the approval workflow.
    Workflow(WorkflowArgs),
    /// Workflow status labels.
    #[command(subcommand)]
    Status(StatusCommand),
    /// Business and security settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Database housekeeping.
    #[command(subcommand)]
    Maintenance(MaintenanceCommand),
    /// Purchase-order counts per status.
    Dashboard,
}

#[derive(Debug, Subcommand)]
enum DeptCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        department: Option<Uuid>,
    },
    /// Show one user by id or by e-mail.
    Show {
        #[arg(required_unless_present = "email", conflicts_with = "email")]
        id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
    },
    List {
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long)]
        department: Option<Uuid>,
        #[arg(long)]
        active_only: bool,
    },
    /// Change a user's role and department.
    Role {
        id: Uuid,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        department: Option<Uuid>,
    },
    Activate {
        id: Uuid,
    },
    Deactivate {
        id: Uuid,
    },
}

#[derive(Debug, Args)]
struct SupplierFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    contact_person: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    tin: Option<String>,
}

impl From<SupplierFields> for SupplierInput {
    fn from(value: SupplierFields) -> Self {
        Self {
            name: value.name,
            contact_person: value.contact_person,
            email: value.email,
            phone: value.phone,
            address: value.address,
            tin: value.tin,
        }
    }
}

#[derive(Debug, Subcommand)]
enum SupplierCommand {
    Create(SupplierFields),
    Update {
        id: Uuid,
        #[command(flatten)]
        fields: SupplierFields,
    },
    Show {
        id: Uuid,
    },
    List {
        /// Case-insensitive name filter.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        active_only: bool,
    },
    Activate {
        id: Uuid,
    },
    Deactivate {
        id: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum ItemCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Record a quoted unit price.
    Price {
        #[arg(long)]
        item: Uuid,
        #[arg(long)]
        supplier: Uuid,
        #[arg(long)]
        unit_price: Money,
    },
    /// Price history, newest first.
    Prices {
        #[arg(long)]
        item: Uuid,
        #[arg(long)]
        supplier: Option<Uuid>,
    },
}

#[derive(Debug, Subcommand)]
enum PoCommand {
    /// Create a PO from a JSON request file.
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Show a PO by id or number (`42` or `PO-000042`).
    Show {
        po: String,
    },
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<PoStatus>,
        #[arg(long)]
        requestor: Option<Uuid>,
        #[arg(long)]
        supplier: Option<Uuid>,
        #[arg(long)]
        department: Option<Uuid>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Replace lines and charges of a pending PO from a JSON file.
    Lines {
        po: String,
        #[arg(long)]
        file: PathBuf,
    },
    Delete {
        po: String,
    },
    /// Approval trail, oldest first.
    History {
        po: String,
    },
    /// Number the next created PO would receive.
    NextNumber,
}

#[derive(Debug, Args)]
struct WorkflowArgs {
    #[arg(value_parser = parse_action)]
    action: WorkflowAction,
    po: String,
    #[arg(long)]
    remarks: Option<String>,
}

#[derive(Debug, Subcommand)]
enum StatusCommand {
    List,
    Relabel {
        #[arg(value_parser = parse_status)]
        status: PoStatus,
        #[arg(long)]
        label: String,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Show,
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
enum MaintenanceCommand {
    Check,
    Vacuum,
    Analyze,
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    init_logging(&config)?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let conn = open_db(&db_path)?;
    let ctx = Context {
        conn: &conn,
        actor: cli.actor,
        dashboard: DashboardCache::new(config.cache_ttl()),
    };

    match cli.command {
        Command::Init {
            admin_name,
            admin_email,
        } => run_init(&ctx, &db_path, admin_name, admin_email),
        Command::Dept(command) => run_dept(&ctx, command),
        Command::User(command) => run_user(&ctx, command),
        Command::Supplier(command) => run_supplier(&ctx, command),
        Command::Item(command) => run_item(&ctx, command),
        Command::Po(command) => run_po(&ctx, command),
        Command::Workflow(args) => run_workflow(&ctx, args),
        Command::Status(command) => run_status(&ctx, command),
        Command::Settings(command) => run_settings(&ctx, command),
        Command::Maintenance(command) => run_maintenance(&ctx, command),
        Command::Dashboard => {
            let service = DashboardService::from_connection(ctx.conn, ctx.dashboard.clone())?;
            print_json(&service.status_counts()?)
        }
    }
}

struct Context<'conn> {
    conn: &'conn Connection,
    actor: Option<Uuid>,
    dashboard: DashboardCache,
}

impl Context<'_> {
    fn actor(&self) -> Result<Uuid, CliError> {
        self.actor.ok_or(CliError::MissingActor)
    }
}

fn init_logging(config: &AppConfig) -> Result<(), CliError> {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return Ok(());
    };
    let log_dir = if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| CliError::Io {
                path: log_dir.to_path_buf(),
                source,
            })?
            .join(log_dir)
    };
    procure_core::init_logging(&config.log_level, &log_dir)?;
    Ok(())
}

fn run_init(
    ctx: &Context<'_>,
    db_path: &Path,
    admin_name: Option<String>,
    admin_email: Option<String>,
) -> Result<(), CliError> {
    info!(
        "event=cli_init module=cli status=ok db={}",
        procure_core::logging::log_field(&db_path.display().to_string())
    );
    match (admin_name, admin_email) {
        (Some(name), Some(email)) => {
            let directory = DirectoryService::from_connection(ctx.conn)?;
            print_json(&directory.bootstrap_superadmin(&name, &email)?)
        }
        _ => print_json(&serde_json::json!({
            "db_path": db_path,
            "schema_version": procure_core::db::migrations::latest_version(),
            "core_version": procure_core::core_version(),
        })),
    }
}

fn run_dept(ctx: &Context<'_>, command: DeptCommand) -> Result<(), CliError> {
    let directory = DirectoryService::from_connection(ctx.conn)?;
    match command {
        DeptCommand::Create { name } => {
            print_json(&directory.create_department(ctx.actor()?, &name)?)
        }
        DeptCommand::List => print_json(&directory.list_departments()?),
    }
}

fn run_user(ctx: &Context<'_>, command: UserCommand) -> Result<(), CliError> {
    let directory = DirectoryService::from_connection(ctx.conn)?;
    match command {
        UserCommand::Create {
            name,
            email,
            role,
            department,
        } => {
            let user = NewUser {
                name,
                email,
                role,
                department_id: department,
            };
            print_json(&directory.create_user(ctx.actor()?, &user)?)
        }
        UserCommand::Show { id, email } => match (id, email) {
            (Some(id), _) => print_json(&directory.get_user(id)?),
            (None, Some(email)) => print_json(&directory.get_user_by_email(&email)?),
            (None, None) => Err(CliError::InvalidArgument(
                "user show needs an id or --email".to_string(),
            )),
        },
        UserCommand::List {
            role,
            department,
            active_only,
        } => print_json(&directory.list_users(&UserListQuery {
            role,
            department_id: department,
            active_only,
        })?),
        UserCommand::Role {
            id,
            role,
            department,
        } => print_json(&directory.assign_role(ctx.actor()?, id, role, department)?),
        UserCommand::Activate { id } => {
            print_json(&directory.set_user_active(ctx.actor()?, id, true)?)
        }
        UserCommand::Deactivate { id } => {
            print_json(&directory.set_user_active(ctx.actor()?, id, false)?)
        }
    }
}

fn run_supplier(ctx: &Context<'_>, command: SupplierCommand) -> Result<(), CliError> {
    let directory = DirectoryService::from_connection(ctx.conn)?;
    match command {
        SupplierCommand::Create(fields) => {
            print_json(&directory.create_supplier(ctx.actor()?, &fields.into())?)
        }
        SupplierCommand::Update { id, fields } => {
            print_json(&directory.update_supplier(ctx.actor()?, id, &fields.into())?)
        }
        SupplierCommand::Show { id } => print_json(&directory.get_supplier(id)?),
        SupplierCommand::List { name, active_only } => {
            print_json(&directory.list_suppliers(&SupplierListQuery {
                name_contains: name,
                active_only,
            })?)
        }
        SupplierCommand::Activate { id } => {
            print_json(&directory.set_supplier_active(ctx.actor()?, id, true)?)
        }
        SupplierCommand::Deactivate { id } => {
            print_json(&directory.set_supplier_active(ctx.actor()?, id, false)?)
        }
    }
}

fn run_item(ctx: &Context<'_>, command: ItemCommand) -> Result<(), CliError> {
    let directory = DirectoryService::from_connection(ctx.conn)?;
    match command {
        ItemCommand::Create {
            name,
            unit,
            description,
        } => {
            let item = NewItem {
                name,
                unit,
                description,
            };
            print_json(&directory.create_item(ctx.actor()?, &item)?)
        }
        ItemCommand::List => print_json(&directory.list_items()?),
        ItemCommand::Price {
            item,
            supplier,
            unit_price,
        } => print_json(&directory.record_price(ctx.actor()?, item, supplier, unit_price)?),
        ItemCommand::Prices { item, supplier } => {
            print_json(&directory.price_history(item, supplier)?)
        }
    }
}

fn run_po(ctx: &Context<'_>, command: PoCommand) -> Result<(), CliError> {
    let orders =
        PurchaseOrderService::from_connection(ctx.conn)?.with_dashboard_cache(ctx.dashboard.clone());
    match command {
        PoCommand::Create { file } => {
            let request: CreatePoRequest = read_json(&file)?;
            print_json(&orders.create(ctx.actor()?, &request)?)
        }
        PoCommand::Show { po } => match parse_po_ref(&po)? {
            PoRef::Id(id) => print_json(&orders.get(id)?),
            PoRef::Number(number) => print_json(&orders.get_by_number(number)?),
        },
        PoCommand::List {
            status,
            requestor,
            supplier,
            department,
            limit,
            offset,
        } => print_json(&orders.list(&PoListQuery {
            status,
            requestor_id: requestor,
            supplier_id: supplier,
            department_id: department,
            limit,
            offset,
        })?),
        PoCommand::Lines { po, file } => {
            let request: UpdateLinesRequest = read_json(&file)?;
            let po_id = resolve_po_id(&orders, &po)?;
            print_json(&orders.update_lines(ctx.actor()?, po_id, &request)?)
        }
        PoCommand::Delete { po } => {
            let po_id = resolve_po_id(&orders, &po)?;
            orders.delete(ctx.actor()?, po_id)?;
            print_json(&serde_json::json!({ "deleted": po_id }))
        }
        PoCommand::History { po } => {
            let po_id = resolve_po_id(&orders, &po)?;
            print_json(&orders.history(po_id)?)
        }
        PoCommand::NextNumber => print_json(&serde_json::json!({
            "next_po_number": orders.peek_next_number()?,
        })),
    }
}

fn run_workflow(ctx: &Context<'_>, args: WorkflowArgs) -> Result<(), CliError> {
    let orders = PurchaseOrderService::from_connection(ctx.conn)?;
    let po_id = resolve_po_id(&orders, &args.po)?;
    let approvals =
        ApprovalService::from_connection(ctx.conn)?.with_dashboard_cache(ctx.dashboard.clone());
    let po = approvals.apply(ctx.actor()?, po_id, args.action, args.remarks.as_deref())?;
    print_json(&po)
}

fn run_status(ctx: &Context<'_>, command: StatusCommand) -> Result<(), CliError> {
    let approvals = ApprovalService::from_connection(ctx.conn)?;
    match command {
        StatusCommand::List => print_json(&approvals.list_statuses()?),
        StatusCommand::Relabel { status, label } => {
            print_json(&approvals.relabel_status(ctx.actor()?, status, &label)?)
        }
    }
}

fn run_settings(ctx: &Context<'_>, command: SettingsCommand) -> Result<(), CliError> {
    let settings = SettingsService::from_connection(ctx.conn)?;
    match command {
        SettingsCommand::Show => print_json(&settings.load()?),
        SettingsCommand::Set { key, value } => {
            print_json(&settings.set_value(ctx.actor()?, &key, &value)?)
        }
    }
}

fn run_maintenance(ctx: &Context<'_>, command: MaintenanceCommand) -> Result<(), CliError> {
    let maintenance = MaintenanceService::from_connection(ctx.conn)?;
    let actor = ctx.actor()?;
    match command {
        MaintenanceCommand::Check => print_json(&maintenance.integrity_check(actor)?),
        MaintenanceCommand::Vacuum => {
            maintenance.vacuum(actor)?;
            print_json(&serde_json::json!({ "vacuum": "ok" }))
        }
        MaintenanceCommand::Analyze => {
            maintenance.analyze(actor)?;
            print_json(&serde_json::json!({ "analyze": "ok" }))
        }
        MaintenanceCommand::Stats => print_json(&maintenance.table_stats(actor)?),
    }
}

enum PoRef {
    Id(Uuid),
    Number(i64),
}

fn parse_po_ref(value: &str) -> Result<PoRef, CliError> {
    if let Ok(id) = Uuid::parse_str(value.trim()) {
        return Ok(PoRef::Id(id));
    }
    parse_po_number(value)
        .map(PoRef::Number)
        .ok_or_else(|| CliError::InvalidArgument(format!("`{value}` is not a PO id or number")))
}

fn resolve_po_id<U, S, C, P, T>(
    orders: &PurchaseOrderService<U, S, C, P, T>,
    value: &str,
) -> Result<Uuid, CliError>
where
    U: procure_core::repo::directory_repo::UserRepository,
    S: procure_core::repo::directory_repo::SupplierRepository,
    C: procure_core::repo::catalog_repo::CatalogRepository,
    P: procure_core::repo::po_repo::PurchaseOrderRepository,
    T: procure_core::repo::settings_repo::SettingsRepository,
{
    match parse_po_ref(value)? {
        PoRef::Id(id) => Ok(id),
        PoRef::Number(number) => Ok(orders.get_by_number(number)?.id),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: Some(path.to_path_buf()),
        source,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|source| CliError::Json { path: None, source })?;
    println!("{text}");
    Ok(())
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::parse(value).ok_or_else(|| {
        let known: Vec<&str> = Role::ALL.iter().map(|role| role.as_str()).collect();
        format!("unknown role `{value}`; expected one of {}", known.join(", "))
    })
}

fn parse_status(value: &str) -> Result<PoStatus, String> {
    PoStatus::parse(value).ok_or_else(|| format!("unknown status `{value}`"))
}

fn parse_action(value: &str) -> Result<WorkflowAction, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "verify" => Ok(WorkflowAction::Verify),
        "approve" => Ok(WorkflowAction::Approve),
        "receive" => Ok(WorkflowAction::Receive),
        "reject" => Ok(WorkflowAction::Reject),
        other => Err(format!(
            "unknown action `{other}`; expected verify, approve, receive or reject"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_action, parse_po_ref, parse_role, Cli, PoRef};
    use clap::{CommandFactory, Parser};
    use procure_core::model::directory::Role;
    use procure_core::model::status::WorkflowAction;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn workflow_command_parses_action_and_remarks() {
        let cli = Cli::try_parse_from([
            "procure",
            "--actor",
            "6f1c1f0e-8a51-4a6e-9a43-5d2a1c3b9e01",
            "workflow",
            "reject",
            "PO-000007",
            "--remarks",
            "over budget",
        ])
        .unwrap();
        assert!(cli.actor.is_some());
        match cli.command {
            super::Command::Workflow(args) => {
                assert_eq!(args.action, WorkflowAction::Reject);
                assert_eq!(args.po, "PO-000007");
                assert_eq!(args.remarks.as_deref(), Some("over budget"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn user_show_takes_id_or_email_but_not_both() {
        let cli = Cli::try_parse_from(["procure", "user", "show", "--email", "Hana@Example.com"])
            .unwrap();
        match cli.command {
            super::Command::User(super::UserCommand::Show { id, email }) => {
                assert_eq!(id, None);
                assert_eq!(email.as_deref(), Some("Hana@Example.com"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["procure", "user", "show"]).is_err());
        assert!(Cli::try_parse_from([
            "procure",
            "user",
            "show",
            "6f1c1f0e-8a51-4a6e-9a43-5d2a1c3b9e01",
            "--email",
            "hana@example.com",
        ])
        .is_err());
    }

    #[test]
    fn po_reference_accepts_uuid_and_number() {
        assert!(matches!(
            parse_po_ref("6f1c1f0e-8a51-4a6e-9a43-5d2a1c3b9e01"),
            Ok(PoRef::Id(_))
        ));
        assert!(matches!(parse_po_ref("PO-000042"), Ok(PoRef::Number(42))));
        assert!(parse_po_ref("purchase").is_err());
    }

    #[test]
    fn value_parsers_reject_unknown_names() {
        assert_eq!(parse_role("department-head"), Ok(Role::DepartmentHead));
        assert!(parse_role("janitor").is_err());
        assert_eq!(parse_action("Approve"), Ok(WorkflowAction::Approve));
        assert!(parse_action("escalate").is_err());
    }
}

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    AggregateSpec, Db, Engine, EngineError, FindMany, GroupBy, Role, SortOrder,
    customers::CustomerCreate,
    invoices::{self, InvoiceInclude, InvoiceKey},
    users::{self, UserCreate},
};
use sea_orm::DatabaseConnection;
use serde_json::json;

mod export;
mod prompt;
mod settings;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "bottega_admin")]
#[command(about = "Admin utilities for Bottega (users, customers, invoices, exports)")]
struct Cli {
    /// Database connection string. Overrides `bottega.toml` and
    /// `BOTTEGA__DATABASE__URL`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Customer(Customer),
    Invoice(Invoice),
    /// Row counts per table and invoice totals.
    Stats,
    /// Dump a table as CSV to stdout.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    User,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::User => Role::User,
        }
    }
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long, value_enum, default_value_t = RoleArg::User)]
    role: RoleArg,
}

#[derive(Args, Debug)]
struct Customer {
    #[command(subcommand)]
    command: CustomerCommand,
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
    Create(CustomerCreateArgs),
}

#[derive(Args, Debug)]
struct CustomerCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct Invoice {
    #[command(subcommand)]
    command: InvoiceCommand,
}

#[derive(Subcommand, Debug)]
enum InvoiceCommand {
    /// Print an invoice with its customer, items and cash flows as JSON.
    Show { id: String },
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(value_enum)]
    table: export::Table,
}

fn hash_password(password: &str) -> Result<String, BoxError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

async fn stats(db: Db<'_, DatabaseConnection>) -> Result<serde_json::Value, BoxError> {
    let counts = json!({
        "users": db.users().count(&Default::default()).await?,
        "materials": db.materials().count(&Default::default()).await?,
        "products": db.products().count(&Default::default()).await?,
        "customers": db.customers().count(&Default::default()).await?,
        "invoices": db.invoices().count(&Default::default()).await?,
        "invoice_items": db.invoice_items().count(&Default::default()).await?,
        "cash_flows": db.cash_flows().count(&Default::default()).await?,
        "purchases": db.purchases().count(&Default::default()).await?,
        "purchase_items": db.purchase_items().count(&Default::default()).await?,
    });

    let totals = AggregateSpec::new()
        .count()
        .sum(invoices::Column::TotalCents)
        .avg(invoices::Column::TotalCents);
    let invoices = db
        .invoices()
        .aggregate(&Default::default(), &totals)
        .await?;
    let by_status = db
        .invoices()
        .group_by(
            &GroupBy::new([invoices::Column::Status])
                .aggregates(totals)
                .order_by(invoices::Column::Status, SortOrder::Asc),
        )
        .await?;

    Ok(json!({
        "counts": counts,
        "invoices": invoices,
        "invoices_by_status": by_status,
    }))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let mut settings = settings::Settings::new()?;
    if let Some(url) = cli.database_url {
        settings.database.url = url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bottega_admin={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let engine = Engine::connect(&settings.database).await?;
    let db = engine.db();

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = hash_password(&prompt::new_password()?)?;
            let created = db
                .users()
                .create(UserCreate {
                    email: args.email,
                    name: args.name,
                    password,
                    role: Some(args.role.into()),
                    ..Default::default()
                })
                .await;
            match created {
                Ok(user) => println!("created user: {} ({})", user.email, user.id),
                Err(EngineError::UniqueViolation(_)) => {
                    eprintln!("user already exists");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::User(User {
            command: UserCommand::List,
        }) => {
            let users = db
                .users()
                .find_many(FindMany::new().order_by(users::Column::Email, SortOrder::Asc))
                .await?;
            for user in users {
                println!(
                    "{}\t{}\t{}\t{:?}\t{}",
                    user.id,
                    user.email,
                    user.name,
                    user.role,
                    if user.is_active { "active" } else { "inactive" }
                );
            }
        }
        Command::Customer(Customer {
            command: CustomerCommand::Create(args),
        }) => {
            let customer = db
                .customers()
                .create(CustomerCreate {
                    name: args.name,
                    phone: args.phone,
                    email: args.email,
                    address: args.address,
                    notes: args.notes,
                    ..Default::default()
                })
                .await?;
            println!("created customer: {} ({})", customer.name, customer.id);
        }
        Command::Invoice(Invoice {
            command: InvoiceCommand::Show { id },
        }) => {
            let Some(invoice) = db
                .invoices()
                .find_unique_with(&InvoiceKey::Id(id.clone()), &InvoiceInclude::all())
                .await?
            else {
                eprintln!("invoice not found: {id}");
                std::process::exit(1);
            };
            println!("{}", serde_json::to_string_pretty(&invoice)?);
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&stats(db).await?)?);
        }
        Command::Export(args) => {
            let rows = export::table(db, args.table, std::io::stdout().lock()).await?;
            tracing::info!(rows, table = ?args.table, "export finished");
        }
    }

    engine.close().await?;
    Ok(())
}

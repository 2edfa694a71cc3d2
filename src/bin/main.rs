use anyhow::{Context, Error};
use clinic_client::{
    endpoints::{self, admin, doctor, patient, Credentials},
    overview::{self, SectionError},
    ApiError, Client, ClientConfig, FileStorage, Role, SessionStore,
    UserProfile,
};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    log::debug!("Using the backend at {}", args.base_url);

    let session_file = args.session_file();
    let store = Arc::new(SessionStore::new(FileStorage::new(&session_file)));
    store.restore().with_context(|| {
        format!("Unable to read the session from {}", session_file.display())
    })?;

    let config = ClientConfig::new(&args.base_url)
        .with_context(|| format!("\"{}\" isn't a valid URL", args.base_url))?;
    let client = Client::new(config, Arc::clone(&store))?;

    let outcome = match args.cmd {
        Command::Login { email, password } => {
            login(&client, Credentials::new(email, password)).await
        },
        Command::Logout => {
            store.logout()?;
            println!("Logged out");
            Ok(())
        },
        Command::Whoami => whoami(&store),
        Command::Appointments => appointments(&client).await,
        Command::Dashboard => dashboard(&client).await,
    };

    // a rejected token has already been cleared by the client
    if let Some(ApiError::Auth) = outcome
        .as_ref()
        .err()
        .and_then(|e| e.chain().find_map(|c| c.downcast_ref::<ApiError>()))
    {
        eprintln!("Your session has expired. Run `clinic login` again.");
    }

    outcome
}

async fn login(client: &Client, credentials: Credentials) -> Result<(), Error> {
    let profile = endpoints::sign_in(client, &credentials).await?;
    println!("Logged in as {} ({})", profile.name, profile.role);
    Ok(())
}

fn whoami(store: &SessionStore) -> Result<(), Error> {
    match store.snapshot().user() {
        Some(user) => print_profile(user),
        None => println!("Not logged in"),
    }

    Ok(())
}

fn print_profile(user: &UserProfile) {
    println!("{} <{}>", user.name, user.email);
    println!("  role:    {}", user.role);
    if let Some(phone) = &user.phone {
        println!("  phone:   {}", phone);
    }
    if let Some(address) = &user.address {
        println!("  address: {}", address);
    }
}

fn current_role(client: &Client) -> Result<Role, Error> {
    client
        .session()
        .snapshot()
        .user()
        .map(|u| u.role)
        .context("Not logged in. Run `clinic login` first.")
}

async fn appointments(client: &Client) -> Result<(), Error> {
    let appointments = match current_role(client)? {
        Role::Patient => patient::get_appointments(client).await?,
        Role::Doctor => doctor::get_appointments(client).await?,
        Role::Admin => admin::get_all_appointments(client).await?,
    };

    println!("{}", serde_json::to_string_pretty(&appointments)?);
    Ok(())
}

async fn dashboard(client: &Client) -> Result<(), Error> {
    match current_role(client)? {
        Role::Patient => {
            let overview = overview::load_patient_overview(client).await;
            warn_about(&overview.failures);
            print_section("Appointments", &overview.appointments)?;
            print_section("Prescriptions", &overview.prescriptions)?;
            print_section("Medical records", &overview.records)?;
        },
        Role::Doctor => {
            let overview = overview::load_doctor_overview(client).await;
            warn_about(&overview.failures);
            let stats = &overview.stats;
            println!("Patients:           {}", stats.total_patients);
            println!("Appointments today: {}", stats.appointments_today);
            println!("Pending reports:    {}", stats.pending_reports);
            println!("Total earnings:     {:.2}", stats.total_earnings);
            print_section("Appointments", &overview.appointments)?;
            print_section("Patients", &overview.patients)?;
        },
        Role::Admin => {
            let overview = overview::load_admin_overview(client).await;
            warn_about(&overview.failures);
            print_section("Doctors", &overview.doctors)?;
            print_section("Patients", &overview.patients)?;
            print_section("Appointments", &overview.appointments)?;
        },
    }

    Ok(())
}

fn warn_about(failures: &[SectionError]) {
    for failure in failures {
        eprintln!("warning: couldn't load {}: {}", failure.section, failure.error);
    }
}

fn print_section(title: &str, items: &[Value]) -> Result<(), Error> {
    println!("*** {} ({}) ***", title, items.len());
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }

    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Talk to the clinic backend from the command line")]
struct Args {
    #[structopt(
        long = "base-url",
        env = "CLINIC_API_URL",
        default_value = "http://127.0.0.1:2739/api",
        help = "Where the clinic backend's API lives"
    )]
    base_url: String,
    #[structopt(
        long = "session-file",
        env = "CLINIC_SESSION_FILE",
        parse(from_os_str),
        help = "Where to remember who is logged in"
    )]
    session_file: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: Command,
}

impl Args {
    fn session_file(&self) -> PathBuf {
        if let Some(ref path) = self.session_file {
            return path.clone();
        }

        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".clinic").join("session.json"),
            None => PathBuf::from(".clinic-session.json"),
        }
    }
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Log in and remember the session
    Login {
        #[structopt(short = "e", long = "email", help = "Your email address")]
        email: String,
        #[structopt(short = "p", long = "password", help = "Your password")]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List appointments for the logged-in user
    Appointments,
    /// Show the logged-in user's dashboard
    Dashboard,
}

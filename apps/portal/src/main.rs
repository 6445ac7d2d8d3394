use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;

use app::Portal;
use appointment_cell::models::{
    parse_date_filter, parse_status_filter, Appointment, AppointmentListView, DoctorAppointmentsFilter,
    PatientAppointmentsFilter, StatusChange, DATE_FORMAT,
};
use appointment_cell::BookingResult;
use auth_cell::models::{LoginForm, RegisterDoctorRequest, RegisterPatientRequest, Route};
use doctor_cell::models::{DirectoryFilter, Doctor};
use shared_config::AppConfig;
use shared_models::auth::Role;

#[derive(Parser)]
#[command(name = "medibook", version, about = "MediBook - book and manage doctor appointments")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "MEDIBOOK_API_URL")]
    api_url: Option<String>,

    /// Print query cache statistics before exiting
    #[arg(long)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// PATIENT or DOCTOR
        #[arg(long)]
        role: Role,
    },
    /// Create a patient account
    RegisterPatient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Create a doctor account
    RegisterDoctor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        specialization: String,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Clear the persisted session
    Logout,
    /// List specializations
    Specializations,
    /// Browse doctors (patient)
    Doctors {
        #[arg(long, default_value = "1")]
        page: u32,
        /// Specialization, or "all"
        #[arg(long)]
        specialization: Option<String>,
        /// Case-insensitive name search
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Book an appointment (patient)
    Book {
        #[arg(long)]
        doctor_id: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
    },
    /// List my appointments (patient)
    Appointments {
        /// PENDING, COMPLETED or CANCELLED; empty for all
        #[arg(long, default_value = "")]
        status: String,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Cancel an appointment (patient or doctor)
    Cancel { appointment_id: String },
    /// Mark an appointment completed (doctor)
    Complete { appointment_id: String },
    /// Appointments assigned to me with stats (doctor)
    Dashboard {
        /// PENDING, COMPLETED, CANCELLED or "all"
        #[arg(long, default_value = "all")]
        status: String,
        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        date: String,
        #[arg(long, default_value = "1")]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    let portal = Portal::new(&config);
    info!("Session storage at {}", config.storage_path.display());

    let outcome = run(&portal, cli.command).await;

    if cli.stats {
        let stats = portal.queries.stats();
        println!(
            "cache: {} entries, {} hits, {} misses, {} fetches, {} deduplicated, hit rate {:.0}%",
            stats.total_entries,
            stats.hits,
            stats.misses,
            stats.fetches,
            stats.deduplicated,
            stats.hit_rate() * 100.0
        );
    }

    outcome
}

async fn run(portal: &Portal, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password, role } => {
            let outcome = portal.auth.login(LoginForm::new(email, password, role)).await?;
            println!("Welcome, {} ({})", outcome.session.user.name, outcome.session.role());
            println!("Next: {}", outcome.redirect);
        }
        Commands::RegisterPatient {
            name,
            email,
            password,
            photo_url,
        } => {
            let message = portal
                .auth
                .register_patient(RegisterPatientRequest {
                    name,
                    email,
                    password,
                    photo_url,
                })
                .await?;
            println!("{}", message);
            println!("Next: {}", Route::Login);
        }
        Commands::RegisterDoctor {
            name,
            email,
            password,
            specialization,
            photo_url,
        } => {
            let message = portal
                .auth
                .register_doctor(RegisterDoctorRequest {
                    name,
                    email,
                    password,
                    specialization,
                    photo_url,
                })
                .await?;
            println!("{}", message);
            println!("Next: {}", Route::Login);
        }
        Commands::Logout => {
            let route = portal.auth.logout()?;
            println!("Logged out. Next: {}", route);
        }
        Commands::Specializations => {
            let state = portal.directory.queries().specializations().await;
            if let Some(err) = state.error {
                bail!(err);
            }
            for name in state.data.as_deref().into_iter().flatten() {
                println!("{}", name);
            }
        }
        Commands::Doctors {
            page,
            specialization,
            search,
        } => {
            portal.enter(Route::PatientDashboard)?;
            let view = portal
                .directory
                .view(&DirectoryFilter {
                    search,
                    specialization,
                    page,
                })
                .await;
            if let Some(err) = view.error {
                eprintln!("warning: {}", err.message());
            }
            if view.doctors.is_empty() {
                println!("No doctors found");
            }
            for doctor in &view.doctors {
                print_doctor(doctor);
            }
            println!(
                "page {} of {} ({} doctors)",
                view.pagination.page, view.pagination.total_pages, view.pagination.total
            );
        }
        Commands::Book { doctor_id, date } => {
            portal.enter(Route::PatientDashboard)?;
            let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
                .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", date))?;
            let today = Local::now().date_naive();

            let mut dialog = portal.booking_dialog();
            dialog.open_for(doctor_id);
            dialog.select_date(date, today)?;
            dialog.confirm(today).await?;
            if let BookingResult::Success { message, .. } = dialog.result() {
                println!("{}", message);
            }
        }
        Commands::Appointments { status, page } => {
            portal.enter(Route::PatientAppointments)?;
            let filter = PatientAppointmentsFilter {
                status: parse_status_filter(&status)?,
                page,
            };
            let list = portal.patient_appointments().load(filter).await;
            print_list(&list);
        }
        Commands::Cancel { appointment_id } => {
            let role = portal.auth.sessions().load()?.map(|session| session.role());
            let change = match role {
                Some(Role::Doctor) => {
                    portal.enter(Route::DoctorDashboard)?;
                    portal.doctor_dashboard().cancel(&appointment_id).await?
                }
                _ => {
                    portal.enter(Route::PatientAppointments)?;
                    portal.patient_appointments().cancel(&appointment_id).await?
                }
            };
            print_change(&appointment_id, &change);
        }
        Commands::Complete { appointment_id } => {
            portal.enter(Route::DoctorDashboard)?;
            let change = portal.doctor_dashboard().complete(&appointment_id).await?;
            print_change(&appointment_id, &change);
        }
        Commands::Dashboard { status, date, page } => {
            let session = portal.enter(Route::DoctorDashboard)?;
            let filter = DoctorAppointmentsFilter {
                status: parse_status_filter(&status)?,
                date: parse_date_filter(&date)?,
                page: page.max(1),
            };
            let view = portal.doctor_dashboard().load(filter).await;
            if let Some(session) = session {
                println!("Dr. {}", session.user.name);
            }
            println!(
                "total {} | pending {} | completed {} | cancelled {}",
                view.stats.total, view.stats.pending, view.stats.completed, view.stats.cancelled
            );
            print_list(&view.list);
        }
    }

    Ok(())
}

fn print_doctor(doctor: &Doctor) {
    println!("  {:12} {:28} {}", doctor.id, doctor.name, doctor.specialization);
}

fn print_appointment(appointment: &Appointment) {
    let with = appointment
        .doctor
        .as_ref()
        .map(|d| d.name.as_str())
        .or_else(|| appointment.patient.as_ref().map(|p| p.name.as_str()))
        .unwrap_or("-");
    println!(
        "  {:12} {} {:10} {}",
        appointment.id,
        appointment.calendar_date().format(DATE_FORMAT),
        appointment.status,
        with
    );
}

fn print_list(list: &AppointmentListView) {
    if let Some(err) = &list.error {
        eprintln!("warning: {}", err.message());
    }
    if list.appointments.is_empty() {
        println!("No appointments found");
    }
    for appointment in &list.appointments {
        print_appointment(appointment);
    }
    println!("page {} of {}", list.pagination.page, list.pagination.total_pages);
}

fn print_change(appointment_id: &str, change: &StatusChange) {
    match change {
        StatusChange::Applied(receipt) => println!(
            "{}",
            receipt
                .message
                .as_deref()
                .unwrap_or("Appointment status updated")
        ),
        StatusChange::AlreadyApplied { status, .. } => {
            println!("Appointment {} is already {}", appointment_id, status)
        }
    }
}

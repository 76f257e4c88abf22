use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use pashusewa::{describe, SessionApp};
use pashusewa_core::{
    telemetry, Authenticator, ControllerOptions, FarmerSignup, FileSessionStore, RuntimeSettings,
    SessionController, Signup, VetSignup,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "pashusewa", version, about = "PashuSewa session tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Directory holding session_data.json (overrides pashusewa.yaml).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the restored session and the start screen.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in to it.
    Signup(SignupArgs),
    /// Sign out and clear the stored session.
    Logout,
    /// Print every session transition until interrupted.
    Watch,
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    /// Mobile number, 10 digits for vets.
    #[arg(long)]
    phone: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    /// Register as a vet; the clinic fields below are then required.
    #[arg(long)]
    vet: bool,
    #[arg(long, default_value = "")]
    reg_number: String,
    #[arg(long, default_value = "")]
    specialization: String,
    #[arg(long, default_value = "")]
    clinic_name: String,
    #[arg(long, default_value = "")]
    clinic_address: String,
}

impl From<SignupArgs> for Signup {
    fn from(args: SignupArgs) -> Self {
        if args.vet {
            Signup::Vet(VetSignup {
                full_name: args.full_name,
                phone_number: args.phone,
                email: args.email,
                password: args.password,
                confirm_password: args.confirm_password,
                vet_reg_number: args.reg_number,
                specialization: args.specialization,
                clinic_name: args.clinic_name,
                clinic_address: args.clinic_address,
            })
        } else {
            Signup::Farmer(FarmerSignup {
                full_name: args.full_name,
                email: args.email,
                mobile_number: args.phone,
                password: args.password,
                confirm_password: args.confirm_password,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::env_filter("warn"))?;
    let cli = Cli::parse();

    let settings = RuntimeSettings::load().map_err(|err| anyhow!(err.user_message()))?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| settings.session.data_dir.clone());
    let store = FileSessionStore::in_dir(&data_dir);
    let controller = SessionController::with_options(
        Arc::new(store),
        ControllerOptions {
            persist_role: settings.session.persist_role,
        },
    );
    let auth = match settings.firebase() {
        Ok(firebase) => Some(Authenticator::firebase(firebase)),
        Err(err) => {
            warn!(error = %err, "remote sign-in unavailable");
            None
        }
    };
    let mut app = SessionApp::start(controller, auth).await;

    match cli.command {
        Command::Status { json } => {
            let state = app.controller().current();
            if json {
                let rendered = serde_json::to_string_pretty(&serde_json::json!({
                    "session": state,
                    "route": app.route(),
                }))
                .context("failed to render session")?;
                println!("{rendered}");
            } else {
                println!("{}", describe(&state));
                println!("start screen: {}", app.route());
            }
        }
        Command::Login { email, password } => {
            let outcome = app.login(&email, &password).await;
            if let Some(error) = outcome.error {
                return Err(anyhow!(error));
            }
            println!("{}", describe(&app.controller().current()));
            println!("screen: {}", outcome.route);
        }
        Command::Signup(args) => {
            let outcome = app.sign_up(&Signup::from(args)).await;
            if let Some(error) = outcome.error {
                return Err(anyhow!(error));
            }
            println!("{}", describe(&app.controller().current()));
            println!("screen: {}", outcome.route);
        }
        Command::Logout => {
            let outcome = app.logout().await;
            if let Some(error) = outcome.error {
                return Err(anyhow!(error));
            }
            println!("signed out; screen: {}", outcome.route);
        }
        Command::Watch => {
            tokio::select! {
                _ = app.follow(|state, route| println!("{} [{}]", describe(state), route)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }

    Ok(())
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use bevy_ecs::prelude::World;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use petride_core::app::{
    accept_offer, acknowledge_ride, apply_onboarding, build_app, checkout, finish_dispatched_ride,
    offer_ride, quote, request_route, RideCompletionHook,
};
use petride_core::booking::{BookingCommand, BookingState, BookingStep};
use petride_core::config::AppParams;
use petride_core::dispatch::{DriverDispatch, BOARDING_CHECKLIST};
use petride_core::empathy::{score, QUESTIONS};
use petride_core::feedback::RideFeedback;
use petride_core::fixtures::Directory;
use petride_core::onboarding::{
    DriverAccount, KitEvidence, OnboardingCommand, OnboardingStepKey, StepEvidence, ADHESION_FEE,
    KIT_ITEMS,
};
use petride_core::payment::{PaymentMethod, PaymentSession, PaymentState};
use petride_core::pricing::estimate_with;
use petride_core::ride::RideLifecycle;
use petride_core::routing::RouteQuery;
use petride_core::runner::{ride_schedule, run_until_empty};
use petride_core::split::calculate_split;
use petride_core::telemetry::RideTelemetry;

/// Upper bound on events processed by one scripted run.
const MAX_STEPS: usize = 10_000;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "petride",
    about = "Pet-friendly ride booking simulator",
    long_about = "Drives the rider booking flow and the driver onboarding flow\n\
                  against a virtual clock and prints the outcome as JSON."
)]
struct Cli {
    /// JSON file with application parameters
    #[arg(long, global = true, env = "PETRIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Install a payment processor that declines every charge
    #[arg(long, global = true)]
    decline_payment: bool,

    /// Seed for transaction ids
    #[arg(long, global = true, env = "PETRIDE_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Book, pay for and run one ride end to end
    Ride(RideArgs),
    /// Price a trip without booking it
    Estimate {
        /// Trip distance in kilometres
        #[arg(long)]
        distance_km: f64,
        /// Number of pets on board
        #[arg(long, default_value_t = 1)]
        pets: usize,
    },
    /// Show the platform/driver split of a fare
    Split {
        /// Gross fare in BRL
        gross: f64,
    },
    /// Walk the fixture driver through onboarding
    Onboard {
        /// Also accept and complete the sample ride offer
        #[arg(long)]
        dispatch: bool,
    },
}

#[derive(Args)]
struct RideArgs {
    /// Pickup location id from the directory
    #[arg(long, default_value = "loc-home")]
    from: String,
    /// Drop-off location id from the directory
    #[arg(long, default_value = "loc-vet")]
    to: String,
    /// Pet id to bring along (repeatable)
    #[arg(long = "pet", default_values_t = ["pet-001".to_string()])]
    pets: Vec<String>,
    #[arg(value_enum, long, default_value_t = MethodArg::Pix)]
    method: MethodArg,
    /// Star rating left after the ride
    #[arg(long)]
    rating: Option<u8>,
    #[arg(long, default_value = "")]
    comment: String,
    /// Tip in whole BRL
    #[arg(long, default_value_t = 0)]
    tip: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Pix,
    CreditCard,
    Boleto,
}

impl From<MethodArg> for PaymentMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Pix => PaymentMethod::Pix,
            MethodArg::CreditCard => PaymentMethod::CreditCard,
            MethodArg::Boleto => PaymentMethod::Boleto,
        }
    }
}

// ── Entry point ────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("failed to render report: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let mut params = match &cli.config {
        Some(path) => AppParams::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppParams::default(),
    };
    if let Some(seed) = cli.seed {
        params = params.with_seed(seed);
    }
    if cli.decline_payment {
        params = params.with_declined_payments(true);
    }

    match cli.command {
        Commands::Ride(args) => run_ride(params, args),
        Commands::Estimate { distance_km, pets } => {
            if !distance_km.is_finite() {
                bail!("distance must be a finite number");
            }
            Ok(serde_json::to_value(estimate_with(&params.pricing, distance_km, pets))?)
        }
        Commands::Split { gross } => Ok(serde_json::to_value(calculate_split(gross))?),
        Commands::Onboard { dispatch } => run_onboard(params, dispatch),
    }
}

fn new_world(params: AppParams) -> Result<World> {
    let mut world = World::new();
    build_app(&mut world, params)?;
    Ok(world)
}

// ── Rider flow ─────────────────────────────────────────────────────

fn run_ride(params: AppParams, args: RideArgs) -> Result<Value> {
    let feedback = args
        .rating
        .map(|rating| RideFeedback::new(rating, args.comment.clone(), args.tip))
        .transpose()?;

    let mut world = new_world(params)?;
    world.insert_resource(RideCompletionHook::new(|record| {
        info!(
            ride = record.generation,
            driver = %record.driver_id,
            time_to_pickup_ms = record.time_to_pickup(),
            trip_ms = record.trip_duration(),
            "ride completed"
        );
    }));
    let mut schedule = ride_schedule();

    let (origin, destination) = {
        let directory = world.resource::<Directory>();
        let lookup = |id: &str| {
            directory
                .location(id)
                .cloned()
                .ok_or_else(|| anyhow!("unknown location id {id:?}"))
        };
        (lookup(&args.from)?, lookup(&args.to)?)
    };

    let mut commands = vec![
        BookingCommand::SetOrigin(Some(origin)),
        BookingCommand::SetDestination(Some(destination)),
    ];
    commands.extend(args.pets.iter().cloned().map(BookingCommand::AddPet));
    {
        let mut booking = world.resource_mut::<BookingState>();
        for command in commands {
            let outcome = booking.apply(command.clone());
            if !outcome.is_accepted() {
                warn!(?command, ?outcome, "booking command rejected");
            }
        }
        while booking.step != BookingStep::Summary {
            if !booking.can_proceed() {
                bail!("booking cannot proceed past {:?}", booking.step);
            }
            booking.next_step();
        }
    }

    request_route(&mut world).ok_or_else(|| anyhow!("booking is missing an endpoint"))?;
    while world.resource::<RouteQuery>().is_loading() {
        if run_until_empty(&mut world, &mut schedule, 1) == 0 {
            bail!("route lookup never resolved");
        }
    }
    if let Some(err) = world.resource::<RouteQuery>().error() {
        bail!("route lookup failed: {err}");
    }
    let estimate = quote(&world).ok_or_else(|| anyhow!("no quote for the booking"))?;
    info!(total = %estimate.formatted_total, "quoted ride");

    let request = checkout(&mut world, args.method.into())?;
    let steps = run_until_empty(&mut world, &mut schedule, MAX_STEPS);

    let payment = match world.resource::<PaymentSession>().state() {
        PaymentState::Succeeded(result) => json!({
            "status": "succeeded",
            "transaction_id": result.transaction_id,
            "message": result.message,
        }),
        PaymentState::Failed(reason) => json!({ "status": "failed", "error": reason }),
        PaymentState::Pending { .. } => json!({ "status": "pending" }),
        PaymentState::Idle => json!({ "status": "idle" }),
    };

    let (final_status, history) = {
        let ride = world.resource::<RideLifecycle>();
        (ride.status(), serde_json::to_value(ride.history())?)
    };
    let acknowledged = acknowledge_ride(&mut world, feedback);

    Ok(json!({
        "events_processed": steps,
        "quote": estimate,
        "payment_request": request,
        "payment": payment,
        "final_status": final_status,
        "status_after_acknowledge": acknowledged,
        "history": history,
        "telemetry": world.resource::<RideTelemetry>(),
    }))
}

// ── Driver flow ────────────────────────────────────────────────────

fn run_onboard(params: AppParams, dispatch: bool) -> Result<Value> {
    let mut world = new_world(params)?;

    let answers: HashMap<String, String> = QUESTIONS
        .iter()
        .filter_map(|q| {
            let best = q.options.iter().max_by_key(|o| o.points)?;
            Some((q.id.to_string(), best.id.to_string()))
        })
        .collect();
    let empathy = score(&answers);
    info!(score = empathy.score, passed = empathy.passed, "empathy test scored");

    let steps = [
        (OnboardingStepKey::Registration, None),
        (
            OnboardingStepKey::EmpathyTest,
            Some(StepEvidence::EmpathyTest { score: empathy.score }),
        ),
        (
            OnboardingStepKey::Payment,
            Some(StepEvidence::Payment {
                amount: ADHESION_FEE,
                payment_id: "pay_adhesion".into(),
                method: PaymentMethod::Pix,
            }),
        ),
        (
            OnboardingStepKey::KitInstallation,
            Some(StepEvidence::KitInstallation(KitEvidence {
                photo_url: Some("https://example.com/kit.jpg".into()),
                checked_items: [true; KIT_ITEMS.len()],
            })),
        ),
    ];
    for (step, evidence) in steps {
        apply_onboarding(&mut world, OnboardingCommand::CompleteStep { step, evidence })
            .with_context(|| format!("completing {step:?}"))?;
    }

    let module_ids: Vec<String> = world
        .resource::<DriverAccount>()
        .onboarding
        .steps
        .training
        .modules
        .iter()
        .map(|m| m.id.clone())
        .collect();
    for id in module_ids {
        apply_onboarding(&mut world, OnboardingCommand::CompleteModule(id.clone()))
            .with_context(|| format!("completing module {id}"))?;
    }
    apply_onboarding(&mut world, OnboardingCommand::SetOnline(true))?;

    let ride = if dispatch {
        Some(run_sample_dispatch(&mut world)?)
    } else {
        None
    };

    let account = world.resource::<DriverAccount>();
    Ok(json!({
        "driver": account.driver.id,
        "driver_status": account.driver_status,
        "is_online": account.is_online,
        "training_progress": account.training_progress(),
        "onboarding": account.onboarding,
        "ride": ride,
    }))
}

fn run_sample_dispatch(world: &mut World) -> Result<Value> {
    let offer = world.resource::<Directory>().sample_offer.clone();
    offer_ride(world, offer.clone())?;
    accept_offer(world, &offer.id)?;
    {
        let mut dispatch = world.resource_mut::<DriverDispatch>();
        dispatch.arrive_at_pickup()?;
        for item in BOARDING_CHECKLIST {
            dispatch.toggle_checklist_item(item.id)?;
        }
        dispatch.start_trip()?;
        dispatch.complete_trip()?;
    }
    let split = finish_dispatched_ride(world)?;
    info!(ride = %offer.id, net = split.net, "dispatched ride finished");

    Ok(json!({
        "id": offer.id,
        "split": split,
        "wallet": world.resource::<DriverDispatch>().wallet(),
    }))
}

//! Marquee demo binary
//!
//! Walks one customer through the booking flow: open a showtime, pick seats,
//! add snacks, pay. Talks to `MARQUEE_API_URL` when set, otherwise to an
//! in-memory cinema.
//!
//! ```text
//! marquee [showtime-id] [seat ...]
//! ```

use anyhow::Context;
use marquee_booking::api::BookingApi;
use marquee_booking::types::{
    Money, PaymentMethod, SeatCode, ShowtimeId, SnackId, SnackSelection,
};
use marquee_booking::{
    BookingEnvironment, BookingFlow, Config, FileSnapshotStore, HttpBookingApi,
    MemorySnapshotStore, SeatInventory, SnapshotStore, SnapshotWriter, TracingNotifier,
};
use marquee_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee=info,marquee_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        api_url = config.api_url.as_deref().unwrap_or("in-memory"),
        session = %config.session,
        max_seats = config.max_seats,
        "Configuration loaded"
    );

    let mut args = std::env::args().skip(1);
    let showtime_id = match args.next() {
        Some(raw) => ShowtimeId::new(raw.parse().context("showtime id must be a number")?),
        None => ShowtimeId::new(1),
    };
    let mut seats: Vec<SeatCode> = args
        .map(|raw| SeatCode::parse(&raw))
        .collect::<Result<_, _>>()?;
    if seats.is_empty() {
        seats = ["A1", "A2", "B5"]
            .into_iter()
            .map(SeatCode::parse)
            .collect::<Result<_, _>>()?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let api: Arc<dyn BookingApi> = match &config.api_url {
        Some(url) => Arc::new(HttpBookingApi::new(
            url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )?),
        None => {
            let ttl = chrono::Duration::from_std(config.lock_ttl)?;
            let inventory = SeatInventory::demo(Arc::clone(&clock), ttl).await;
            Arc::new(inventory.session(config.session.clone()))
        },
    };
    let store: Arc<dyn SnapshotStore> = match &config.snapshot_dir {
        Some(dir) => Arc::new(FileSnapshotStore::new(dir.clone())),
        None => Arc::new(MemorySnapshotStore::new()),
    };

    let environment = BookingEnvironment::new(
        api,
        Arc::new(TracingNotifier),
        SnapshotWriter::new(store, config.session.clone()),
        clock,
    )
    .with_max_seats(config.max_seats);
    let flow = BookingFlow::new(environment, config.flow_timeout);

    if let Some(previous) = flow.restore_from_snapshot().await? {
        info!(
            seats = previous.seats.len(),
            "Found an unfinished booking; starting over"
        );
        flow.reset().await?;
    }

    println!("=== Marquee: booking walk-through ===\n");

    let showtime = flow.open_showtime(showtime_id).await?;
    println!(
        "{} in {} at {} ({} per seat)",
        showtime.movie.title,
        showtime.hall,
        showtime.start_time.format("%H:%M"),
        showtime.price
    );

    for code in seats {
        let selected = flow.toggle_seat(code).await?;
        let codes: Vec<&str> = selected.iter().map(SeatCode::as_str).collect();
        println!("Selected: {}", codes.join(", "));
    }

    let lease = flow.continue_to_snacks().await?;
    match lease.expires_at {
        Some(at) => println!("Seats held until {}", at.format("%H:%M:%S")),
        None => println!("Seats held"),
    }

    flow.choose_snacks(vec![SnackSelection {
        id: SnackId::new(1),
        name: "Popcorn combo".to_string(),
        quantity: 2,
        price: Money::new(60_000),
    }])
    .await?;
    println!("Total due: {}", flow.booking_state().await.total());

    let confirmation = flow
        .pay(PaymentMethod::Card {
            last_four: "4242".to_string(),
        })
        .await?;
    println!(
        "\nBooking {} confirmed: {} seat(s), {} charged",
        confirmation.booking_ref,
        confirmation.seats.len(),
        confirmation.total
    );

    flow.shutdown().await?;
    Ok(())
}

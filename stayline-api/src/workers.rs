use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use stayline_core::booking::{Actor, BookingStatus};
use stayline_core::events::BookingEvent;
use stayline_core::repository::{BookingStore, StoreError};
use stayline_store::BookingRepository;

/// Transition ACCEPTED bookings whose stay has ended to COMPLETED and
/// enqueue the status event so the other side converges. One pass.
pub async fn sweep_completed(
    bookings: &BookingRepository,
    update_topic: &str,
) -> Result<usize, StoreError> {
    let today = Utc::now().date_naive();
    let due = bookings.find_completable(today).await?;
    let mut completed = 0;

    for mut booking in due {
        if booking
            .transition(BookingStatus::Completed, Actor::System, None)
            .is_err()
        {
            continue;
        }
        let event = BookingEvent::status_updated(&booking, None);
        bookings
            .update_with_event(&booking, update_topic, &event)
            .await?;
        info!(booking_id = %booking.id, "booking completed after check-out");
        completed += 1;
    }

    Ok(completed)
}

/// Periodic completion sweep, requester side.
pub async fn run_completion_sweeper(
    bookings: Arc<BookingRepository>,
    update_topic: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "completion sweeper started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = sleep(interval) => {
                match sweep_completed(&bookings, &update_topic).await {
                    Ok(0) => {}
                    Ok(n) => info!(completed = n, "completion sweep finished"),
                    Err(e) => error!(error = %e, "completion sweep failed"),
                }
            }
        }
    }

    info!("completion sweeper stopped");
}

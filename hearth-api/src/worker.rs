use std::sync::Arc;

use chrono::{Duration, Utc};
use hearth_booking::repository::ReservationRepository;
use tracing::{error, info};

/// Background cleanup of unpaid reservations.
///
/// A `pending` reservation holds its dates against the calendar. If payment
/// never arrives, the hold must be released or the property is blocked
/// forever; this loop cancels pending reservations older than the
/// configured hold window.
pub async fn start_expiry_worker(
    reservations: Arc<dyn ReservationRepository>,
    hold_minutes: i64,
) {
    info!("Expiry worker started, releasing unpaid holds after {hold_minutes} minutes");

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        ticker.tick().await;

        let cutoff = Utc::now() - Duration::minutes(hold_minutes);
        match reservations.expire_stale_pending(cutoff).await {
            Ok(0) => {}
            Ok(expired) => info!("Released {expired} expired pending reservations"),
            Err(e) => error!("Failed to expire pending reservations: {e}"),
        }
    }
}

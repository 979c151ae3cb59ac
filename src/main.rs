//! AgriConnect realtime listener
//!
//! Opens the realtime channel with `AGRI_AUTH_TOKEN` and logs every event
//! until interrupted.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agriconnect_realtime::auth::redact;
use agriconnect_realtime::models::{ConsultationUpdate, PaymentStatus};
use agriconnect_realtime::{Config, EventKind, RealtimeError, RealtimeService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // wss:// endpoints need a process-wide rustls provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let service = RealtimeService::new(&config)?;

    tracing::info!("Starting AgriConnect realtime listener");
    tracing::info!("Endpoint: {}", redact(service.endpoint()));
    tracing::info!(
        "Reconnect policy: {} attempts, base interval {}ms",
        config.max_reconnect_attempts,
        config.reconnect_interval.as_millis()
    );

    let Some(token) = config.auth_token.clone() else {
        tracing::error!("AGRI_AUTH_TOKEN is not set");
        return Err(RealtimeError::MissingToken.into());
    };

    register_log_listeners(&service);
    service.connect(&token)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.disconnect().await;

    Ok(())
}

/// Log every event the channel delivers.
fn register_log_listeners(service: &RealtimeService) {
    for kind in EventKind::ALL {
        service.on(kind, move |payload| tracing::info!("[{}] {}", kind, payload));
    }

    service.on_typed(|payment: PaymentStatus| {
        if payment.is_final() {
            tracing::info!(
                "Payment {} settled: {:?}",
                payment.payment_id,
                payment.status
            );
        }
    });

    service.on_typed(|update: ConsultationUpdate| {
        tracing::info!(
            "Consultation {} is now {:?}",
            update.consultation_id,
            update.status
        );
    });
}

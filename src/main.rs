//! `unear-session-status`: inspect the locally persisted session.
//!
//! Reads the token store the app writes and reports what it holds,
//! without touching the network. Exits 0 when a usable session is
//! stored (a valid access token, or a refresh token that could renew
//! one) and 1 otherwise, so it can be scripted.

use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unear_session::config::Config;
use unear_session::store::TokenStore;
use unear_session::token::codec;

fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "unear-session-status starting");

    let config = Config::load()?;
    let store = TokenStore::open(&config.storage.data_dir);
    if store.is_memory_only() {
        println!(
            "storage:    unavailable at {} (reporting an empty session)",
            config.storage.data_dir
        );
    } else {
        println!("storage:    {}", config.storage.data_dir);
    }

    let access = store.access_token();
    let refresh_present = store.refresh_token().is_some();

    let usable = match access.as_deref() {
        Some(token) if !codec::is_expired(token) => {
            println!("session:    authenticated");
            report_claims(token, config.refresh.expiry_threshold_secs);
            true
        }
        Some(token) => {
            if refresh_present {
                println!("session:    expired access token, renewable on next use");
            } else {
                println!("session:    expired access token, nothing to renew it with");
            }
            report_claims(token, config.refresh.expiry_threshold_secs);
            refresh_present
        }
        None => {
            if refresh_present {
                println!("session:    no access token, renewable on next use");
            } else {
                println!("session:    none");
            }
            refresh_present
        }
    };

    println!(
        "refresh:    {}",
        if refresh_present { "present" } else { "absent" }
    );
    println!(
        "onboarding: {}",
        if store.onboarding_complete() {
            "completed"
        } else {
            "not completed"
        }
    );

    Ok(if usable {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_claims(token: &str, threshold_secs: u64) {
    let Some(claims) = codec::decode(token) else {
        println!("claims:     undecodable");
        return;
    };

    if let Some(subject) = claims.subject {
        println!("subject:    {subject}");
    }
    if let Some(issued_at) = claims.issued_at {
        println!("issued:     {issued_at}");
    }
    match claims.expires_at {
        Some(expires_at) => {
            let remaining = codec::remaining_seconds(token);
            if remaining > 0 {
                let note = if codec::is_expiring_soon(token, threshold_secs) {
                    " (inside the refresh threshold)"
                } else {
                    ""
                };
                println!("expires:    {expires_at} ({remaining}s left){note}");
            } else {
                println!("expires:    {expires_at} (passed)");
            }
        }
        None => println!("expires:    no usable exp claim"),
    }
}

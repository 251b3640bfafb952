//! mailwatch: near real-time inbox synchronization runtime.
//! Single-process binary embedding the push channel, the polling fallback,
//! desktop notifications, and engagement tracking.

use clap::Parser;

use mailwatch_core::prefs::{
    FilePrefStore, PREF_NOTIFICATIONS_ENABLED, PREF_TRACKING_ENABLED, PrefStore,
};

mod app;
mod cli;
mod consumer;
mod http_api;
mod keys;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Run(opts) => {
            let filter = std::env::var("MAILWATCH_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!(email = %opts.email, "mailwatch starting");
            app::run(opts).await?;
        }
        cli::Command::Prefs(opts) => {
            cmd_prefs(opts)?;
        }
        cli::Command::Status => {
            cmd_status();
        }
    }

    Ok(())
}

fn cmd_prefs(opts: cli::PrefsOpts) -> anyhow::Result<()> {
    let store = FilePrefStore::default_location();
    if let Some(toggle) = opts.notifications {
        store.set(PREF_NOTIFICATIONS_ENABLED, toggle.as_bool())?;
    }
    if let Some(toggle) = opts.tracking {
        store.set(PREF_TRACKING_ENABLED, toggle.as_bool())?;
    }
    print_prefs(&store);
    Ok(())
}

fn cmd_status() {
    let store = FilePrefStore::default_location();
    println!("prefs file: {}", store.path().display());
    print_prefs(&store);
}

fn print_prefs(store: &FilePrefStore) {
    let on_off = |v: bool| if v { "on" } else { "off" };
    println!(
        "notifications: {}",
        on_off(store.get(PREF_NOTIFICATIONS_ENABLED))
    );
    println!("tracking:      {}", on_off(store.get(PREF_TRACKING_ENABLED)));
}

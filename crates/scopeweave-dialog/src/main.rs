//! Scopeweave dialog runner: plays a scripted dialog against a timed window.

use std::error::Error;
use std::io::Write;
use std::rc::Rc;

use scopeweave_core::{Scheduler, SystemClock};
use scopeweave_dialog::config::{DialogConfig, LogFormat};
use scopeweave_dialog::dialog::Dialog;
use scopeweave_dialog::error::DialogError;
use tracing_subscriber::EnvFilter;

const CHOICES: [&str; 4] = ["greet", "bargain", "threaten", "leave"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // Read configuration from environment.
    let config = DialogConfig::from_env()?;

    // Initialize tracing subscriber.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_writer(std::io::stderr)
            .init(),
    }

    tracing::info!(
        window_ms = config.choice_window.as_millis(),
        picks = config.picks.len(),
        "Starting scripted dialog"
    );

    let scheduler = Scheduler::with_config(config.scheduler);
    let dialog = Dialog::open(&scheduler, Rc::new(SystemClock), config.max_asks, CHOICES)?;

    // The window closes on a timer; picks are issued on their own cadence.
    let deadline = tokio::time::sleep(config.choice_window);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(config.pick_interval);
    let mut script = config.picks.iter();

    loop {
        tokio::select! {
            () = &mut deadline, if dialog.is_open() => {
                dialog.close_window()?;
                tracing::info!(prompt = %dialog.prompt().get(), "choice window closed");
            }
            _ = ticker.tick() => {
                let Some(label) = script.next() else {
                    break;
                };
                match dialog.pick(label) {
                    Ok(_) => {}
                    Err(DialogError::UnknownChoice(label)) => {
                        tracing::warn!(%label, "scripted pick names no choice; skipped");
                    }
                    Err(err) => return Err(err.into()),
                }
                dialog.run_turns()?;
            }
        }
    }

    dialog.end()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(dialog.transcript().to_json_lines()?.as_bytes())?;
    stdout.flush()?;

    Ok(())
}

//! riskwatch daemon entry point.
//!
//! Opens (and migrates) the database up front so a broken store fails fast,
//! then feeds the monitor loop from a periodic clock over the watched
//! entities. RUST_LOG controls verbosity; default is info.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use riskwatch::db::RiskDb;
use riskwatch::monitor::{trigger_channel, MonitorTrigger, RiskMonitor};
use riskwatch::types::load_config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();

    // Migrations run here, once, instead of inside the first pass.
    let opened = match &config.db_path {
        Some(path) => RiskDb::open_at(path.clone()),
        None => RiskDb::open(),
    };
    match opened {
        Ok(_db) => log::info!("Database ready"),
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    }

    if config.watched.is_empty() {
        log::warn!("No watched entities configured; the monitor has nothing to do");
    }

    let (tx, rx) = trigger_channel();
    let monitor = RiskMonitor::new(config.clone(), rx);

    // Periodic feed: every watched entity gets a trigger on each tick. The
    // first tick fires immediately, which doubles as the startup pass.
    if let Some(interval_secs) = config.retrigger_interval_secs {
        let watched = config.watched.clone();
        let feed_tx = tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for entity in &watched {
                    let trigger = MonitorTrigger {
                        entity_id: entity.entity_id.clone(),
                        user_id: entity.recipient_id.clone(),
                        role: entity.role,
                    };
                    if feed_tx.send(trigger).await.is_err() {
                        return;
                    }
                }
            }
        });
    } else {
        log::info!("Periodic re-evaluation disabled");
    }
    drop(tx);

    monitor.run().await;
}

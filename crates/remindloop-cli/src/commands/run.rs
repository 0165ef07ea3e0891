use chrono::Utc;
use remindloop_core::{Config, Event, Runtime, RuntimeOptions};
use tracing::{info, warn};

use super::{open_controller, CmdResult};

pub fn run(for_secs: Option<u64>) -> CmdResult {
    let config = Config::load()?;
    let (controller, log) = open_controller(Utc::now())?;
    let options = RuntimeOptions::from(&config.runtime);

    let sink: Box<dyn FnMut(Event) + Send> = Box::new(move |event: Event| {
        if let Err(e) = log.append_log(&event) {
            warn!(error = %e, "could not write nag log");
        }
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "could not encode event"),
        }
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (handle, join) = Runtime::spawn(controller, sink, options);
        match for_secs {
            Some(secs) => {
                tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
                info!(secs, "run window elapsed, stopping");
                handle.shutdown().await?;
            }
            None => {
                // Runs until killed.
                let _handle = handle;
                std::future::pending::<()>().await;
            }
        }
        join.await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

//! Snapshot command - one in-process fetch, printed as JSON.
//!
//! Runs the same service the server runs, without the HTTP layer, so the
//! output is exactly the body `/api/flights` (or `/api/flight`) would return.

use std::path::Path;

use serde::Serialize;
use skyfeed::app::build_state;
use skyfeed::geo::BoundingBox;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the snapshot command.
pub struct SnapshotArgs {
    pub bounds: Option<BoundingBox>,
    pub icao24: Option<String>,
}

pub fn run(args: SnapshotArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    let state = build_state(runner.config())?;

    let (json, outcome, status) = match args.icao24 {
        Some(icao24) => {
            let served = runner.block_on(state.flights.flight(&icao24));
            (to_json(&served.body)?, served.outcome, served.status_code())
        }
        None => {
            let bounds = args.bounds.unwrap_or_default();
            let served = runner.block_on(state.flights.flights(bounds));
            (to_json(&served.body)?, served.outcome, served.status_code())
        }
    };

    info!(%outcome, status, "snapshot fetched");
    println!("{}", json);

    if status >= 400 {
        return Err(CliError::Api(format!("upstream answer {} ({})", status, outcome)));
    }
    Ok(())
}

fn to_json<T: Serialize>(body: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(body).map_err(|e| CliError::Output(e.to_string()))
}

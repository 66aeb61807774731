//! Sidecar command - answers authorization requests over stdin/stdout.
//!
//! Each input line is an `AuthorizeRequest` JSON object; each output line is
//! `{"status": <http status>, "body": <AuthorizeResponse or null>}`.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use fleetgate_authz::{AuthorizeRequest, AuthorizeResponse, SidecarResponse, respond};
use fleetgate_config::FleetgateConfig;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ResponseLine {
    status: u16,
    body: Option<AuthorizeResponse>,
}

impl From<SidecarResponse> for ResponseLine {
    fn from(response: SidecarResponse) -> Self {
        Self {
            status: response.status,
            body: response.body,
        }
    }
}

pub async fn run(config: &FleetgateConfig, snapshot: &Path, at: Option<&str>) -> Result<ExitCode> {
    let wiring = super::wire(config, snapshot, at)?;

    let drain = wiring.channel.map(|mut channel| {
        tokio::spawn(async move {
            while let Some(record) = channel.recv().await {
                match serde_json::to_string(&record) {
                    Ok(line) => eprintln!("{line}"),
                    Err(err) => warn!(error = %err, "Failed to serialize audit record"),
                }
            }
        })
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<AuthorizeRequest>(&line) {
            Ok(request) => ResponseLine::from(respond(&wiring.engine, &request).await),
            Err(err) => {
                debug!(error = %err, "Malformed sidecar request");
                ResponseLine {
                    status: 400,
                    body: None,
                }
            }
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        stdout
            .write_all(out.as_bytes())
            .await
            .context("Failed to write response")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    // Dropping the engine closes the audit channel and ends the drain task.
    drop(wiring.engine);
    if let Some(drain) = drain {
        drain.await.context("Audit drain task failed")?;
    }

    Ok(ExitCode::SUCCESS)
}

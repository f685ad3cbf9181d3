use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::Value;

use sattrack::model::{LocationReport, NowReport, SpeedReport, StateVector, Summary};
use sattrack::parser::{self, Command};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Interactive client for the tracker API", long_about = None)]
struct Args {
    /// Base URL of a running tracker
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    host: String,

    #[clap(long, default_value = "30")]
    timeout_secs: u64,
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn new(host: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("sattrack-cli")
            .build()?;
        Ok(Self { http, base: host.trim_end_matches('/').to_string() })
    }

    /// GET `path`, decoding either the expected body or the server's `{"error": ...}`.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, String> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .query(query)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().await.map_err(|e| format!("bad response body: {}", e));
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let msg = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        Err(format!("{} ({})", msg, status.as_u16()))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    print_banner();

    let client = match Client::new(&args.host, Duration::from_secs(args.timeout_secs)) {
        Ok(client) => client,
        Err(e) => {
            println!("[\u{2717}] Could not build HTTP client: {}", e);
            return;
        }
    };

    match client.get::<Vec<String>>("/epochs", &[("limit", "1".into()), ("offset", "0".into())]).await {
        Ok(_) => println!("[\u{2713}] Connected to tracker at {}!", client.base),
        Err(e) => {
            println!("[\u{2717}] Could not reach tracker at {}: {}", client.base, e);
            println!("    Make sure 'sattrack' is running in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("iss> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        match parser::parse_command(&line) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = execute_command(&client, cmd).await {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if line.contains('\'') {
                    println!("    \u{2139}\u{fe0f}  Hint: Epochs look like '2024-079T12:00:00.000Z'");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   sattrack CLI - ISS ephemeris at your fingertips");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. EPOCHS:   EPOCHS [LIMIT n] [OFFSET m]");
    println!("2. GET:      GET '2024-079T12:00:00.000Z'");
    println!("3. SPEED:    SPEED 'epoch'");
    println!("4. LOCATION: LOCATION 'epoch'");
    println!("5. NOW:      Closest state vector to the current time");
    println!("6. SUMMARY:  Data set overview");
    println!("7. EXIT:     Quit\n");
}

/// The server wants both paging parameters or neither.
fn page_query(limit: Option<usize>, offset: Option<usize>) -> Vec<(&'static str, String)> {
    if limit.is_none() && offset.is_none() {
        return Vec::new();
    }
    vec![
        ("limit", limit.unwrap_or(u32::MAX as usize).to_string()),
        ("offset", offset.unwrap_or(0).to_string()),
    ]
}

async fn execute_command(client: &Client, cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Epochs { limit, offset } => {
            let epochs: Vec<String> = client.get("/epochs", &page_query(limit, offset)).await?;
            println!("\n{} epochs:", epochs.len());
            for epoch in &epochs {
                println!("  \u{2022} {}", epoch);
            }
            println!();
            Ok(())
        }
        Command::Get { epoch } => {
            let sv: StateVector = client.get(&format!("/epochs/{}", epoch), &[]).await?;
            println!("[\u{2713}] {}", sv.epoch);
            println!("  position (km):   x={:.3} y={:.3} z={:.3}", sv.position.x, sv.position.y, sv.position.z);
            println!(
                "  velocity (km/s): x={:.6} y={:.6} z={:.6}",
                sv.velocity.x_dot, sv.velocity.y_dot, sv.velocity.z_dot
            );
            Ok(())
        }
        Command::Speed { epoch } => {
            let report: SpeedReport = client.get(&format!("/epochs/{}/speed", epoch), &[]).await?;
            println!("[\u{2713}] {} | {:.6} km/s", report.epoch, report.speed);
            Ok(())
        }
        Command::Location { epoch } => {
            let report: LocationReport = client.get(&format!("/epochs/{}/location", epoch), &[]).await?;
            println!("[\u{2713}] {}", report.epoch);
            println!(
                "  lat {:.4}\u{b0} lon {:.4}\u{b0} alt {:.2} km",
                report.latitude, report.longitude, report.altitude
            );
            println!("  over: {}", report.geoposition);
            Ok(())
        }
        Command::Now => {
            let report: NowReport = client.get("/now", &[]).await?;
            println!("[\u{23f1}\u{fe0f} Now] closest epoch {}", report.epoch);
            println!(
                "  lat {:.4}\u{b0} lon {:.4}\u{b0} alt {:.2} km | {:.6} km/s",
                report.latitude, report.longitude, report.altitude, report.speed
            );
            println!("  over: {}", report.geoposition);
            Ok(())
        }
        Command::Summary => {
            let summary: Summary = client.get("/summary", &[]).await?;
            println!("\n{} state vectors", summary.count);
            println!("  from {} ({})", summary.start_readable, summary.start);
            println!("  to   {} ({})", summary.end_readable, summary.end);
            println!("  average speed {:.6} km/s\n", summary.average_speed);
            Ok(())
        }
        Command::Exit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_sends_both_or_neither() {
        assert!(page_query(None, None).is_empty());
        assert_eq!(
            page_query(Some(5), None),
            vec![("limit", "5".to_string()), ("offset", "0".to_string())]
        );
        assert_eq!(
            page_query(None, Some(2)),
            vec![("limit", u32::MAX.to_string()), ("offset", "2".to_string())]
        );
    }
}

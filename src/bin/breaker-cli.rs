use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use surge_breaker::SensitivityLevel;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Management CLI for the surge-breaker admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show breaker status and current heavy hitters
    Status,
    /// Check whether a client IP is currently blocked
    Check { ip: String },
    /// Print the sensitivity presets
    Levels,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = match &cli.command {
        Commands::Levels => {
            print_levels();
            return Ok(());
        }
        Commands::Status => "/admin/status".to_string(),
        Commands::Check { ip } => format!("/admin/blocked/{ip}"),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = reqwest::Client::new()
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

fn print_levels() {
    println!(
        "{:<8} {:>3} {:>7} {:>5} {:>6} {:>6} {:>9} {:>7} {:>10}",
        "level", "k", "window", "tick", "width", "depth", "act_rps", "share%", "threshold"
    );
    for level in SensitivityLevel::ALL {
        let p = level.params();
        println!(
            "{:<8} {:>3} {:>7} {:>5} {:>6} {:>6} {:>9} {:>7} {:>10}",
            level.as_str(),
            p.k,
            p.window_size,
            p.tick_size,
            p.width,
            p.depth,
            p.activation_rps,
            p.max_share_percent,
            p.threshold_count()
        );
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

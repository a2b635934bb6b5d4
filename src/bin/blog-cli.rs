use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "blog-cli")]
#[command(about = "Client for the blog-service admission endpoints", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange an app key and secret for a bearer token
    Token {
        #[arg(long)]
        app_key: String,
        #[arg(long)]
        app_secret: String,
    },
    /// Show the claims the service sees for a token
    Whoami {
        #[arg(short, long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Token { app_key, app_secret } => {
            let res = client
                .post(format!("{}/auth", cli.url))
                .json(&serde_json::json!({ "app_key": app_key, "app_secret": app_secret }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Whoami { token } => {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
            let res = client
                .get(format!("{}/api/v1/whoami", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;
    if !status.is_success() {
        eprintln!("Error {}:", status);
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

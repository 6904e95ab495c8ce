//! Command-line entry point: runs the A2A HTTP server, or drives an
//! already-running one for quick manual inspection.
//!
//! Sub-commands are matched by hand rather than through an argument-parsing
//! crate, since the surface is five thin HTTP wrappers plus `start`.

use xactions_a2a::config::Config;

fn print_usage() {
    eprintln!("usage: a2a-server <start|status|skills|agents|discover|task> [args]");
    eprintln!("  start                 run the A2A HTTP server");
    eprintln!("  status                GET /a2a/health on the configured base URL");
    eprintln!("  skills [-q QUERY]     GET /a2a/skills, optionally filtered");
    eprintln!("  agents                GET /a2a/agents");
    eprintln!("  discover <url>        register a remote agent by its base URL");
    eprintln!("  task <description>    run a free-text task through the orchestrator");
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        std::process::exit(1);
    };

    let config = Config::from_env();
    let base_url = config.base_url.clone();

    match command.as_str() {
        "start" => run_server(config).await,
        "status" => cli::status(&base_url).await,
        "skills" => {
            let rest: Vec<String> = args.collect();
            let query = parse_flag(&rest, "-q");
            cli::skills(&base_url, query.as_deref()).await;
        }
        "agents" => cli::agents(&base_url).await,
        "discover" => {
            let Some(url) = args.next() else {
                eprintln!("discover requires a <url> argument");
                std::process::exit(1);
            };
            cli::discover(&base_url, &url).await;
        }
        "task" => {
            let description = args.collect::<Vec<_>>().join(" ");
            if description.is_empty() {
                eprintln!("task requires a <description> argument");
                std::process::exit(1);
            }
            cli::task(&base_url, &description).await;
        }
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

async fn run_server(config: Config) {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = match xactions_a2a::AppState::bootstrap(config).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("failed to initialize a2a state: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = xactions_a2a::server::serve(state, addr).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

/// Thin HTTP wrappers over a running server's JSON-RPC/REST surface.
mod cli {
    use serde_json::Value;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    fn print_json(value: &Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
    }

    async fn get(url: String) {
        match client().get(url).send().await {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(body) => print_json(&body),
                Err(e) => eprintln!("failed to parse response: {e}"),
            },
            Err(e) => eprintln!("request failed: {e}"),
        }
    }

    async fn post(url: String, body: Value) {
        match client().post(url).json(&body).send().await {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(body) => print_json(&body),
                Err(e) => eprintln!("failed to parse response: {e}"),
            },
            Err(e) => eprintln!("request failed: {e}"),
        }
    }

    pub async fn status(base_url: &str) {
        get(format!("{base_url}/a2a/health")).await;
    }

    pub async fn skills(base_url: &str, query: Option<&str>) {
        let mut url = format!("{base_url}/a2a/skills");
        if let Some(q) = query {
            url.push_str("?q=");
            url.push_str(&urlencoding::encode(q));
        }
        get(url).await;
    }

    pub async fn agents(base_url: &str) {
        get(format!("{base_url}/a2a/agents")).await;
    }

    pub async fn discover(base_url: &str, target_url: &str) {
        post(
            format!("{base_url}/a2a/agents/discover"),
            serde_json::json!({ "urls": [target_url] }),
        )
        .await;
    }

    pub async fn task(base_url: &str, description: &str) {
        post(
            format!("{base_url}/a2a/orchestrate"),
            serde_json::json!({ "description": description }),
        )
        .await;
    }
}

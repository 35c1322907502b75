use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use modelcurl::config::AppConfig;
use modelcurl::endpoints::{Endpoint, EndpointRegistry, JsonEndpointStore};
use modelcurl::generation::GenerationController;
use modelcurl::history::HistoryStore;
use modelcurl::inference::types::DEFAULT_MAX_TOKENS;
use modelcurl::inference::{
    detect_provider, prompt_messages, GenerationRequest, HttpTransport, ReasoningConfig,
    ReasoningEffort, Transport,
};
use modelcurl::telemetry::PerformanceMetrics;

#[derive(Parser, Debug)]
#[command(name = "modelcurl", version, about = "Exercise chat-completion LLM endpoints")]
struct Cli {
    /// Endpoint id or name to use for this run (default: the first saved one).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage saved endpoints.
    Endpoints {
        #[command(subcommand)]
        action: EndpointAction,
    },

    /// List the models the endpoint advertises.
    Models,

    /// Check that the endpoint is reachable and accepts the credentials.
    Test,

    /// Send a prompt and print the answer with latency metrics.
    Send {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        /// Override the endpoint's model.
        #[arg(long)]
        model: Option<String>,
        /// Wait for the full response instead of streaming.
        #[arg(long, default_value_t = false)]
        no_stream: bool,
        #[arg(long, default_value_t = 0.0)]
        temperature: f32,
        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
        /// Enable extended thinking (DeepSeek, Qwen, Claude).
        #[arg(long, default_value_t = false)]
        thinking: bool,
        /// Reasoning effort for OpenAI reasoning models.
        #[arg(long)]
        effort: Option<ReasoningEffort>,
        /// Thinking budget in tokens (Qwen, Claude).
        #[arg(long)]
        budget: Option<u32>,
        /// Completion token cap for OpenAI reasoning models.
        #[arg(long)]
        max_completion_tokens: Option<u32>,
    },

    /// Inspect or clear the request history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum EndpointAction {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long, default_value = "")]
        model: String,
        /// Extra header as `Name: value` or `Name=value`; repeatable.
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
    Remove {
        id: String,
    },
    Duplicate {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    Clear,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .or_else(|| raw.split_once('='))
        .ok_or_else(|| format!("expected 'Name: value' or 'Name=value', got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("load config failed")?;
    // Logging is best-effort; the CLI still works without a writable log file.
    if let Err(e) = modelcurl::init_tracing(config.log_filter.as_deref()) {
        eprintln!("warning: logging disabled: {e}");
    }

    let store = Arc::new(JsonEndpointStore::in_data_dir());
    let mut registry = EndpointRegistry::open(store)
        .await
        .context("load endpoints failed")?;

    if let Some(wanted) = &cli.endpoint {
        let id = find_endpoint(&registry, wanted)?.id.clone();
        registry.select(Some(&id))?;
    }

    match cli.command {
        Commands::Endpoints { action } => run_endpoints(&mut registry, action).await,
        Commands::Models => {
            let endpoint = selected(&registry)?;
            let transport = HttpTransport::new(config.timeouts())?;
            let models = transport
                .fetch_available_models(endpoint)
                .await
                .context("fetch models failed")?;
            for model in models {
                let tag = detect_provider(&model)
                    .map(|p| format!("  [{}]", p.display_name()))
                    .unwrap_or_default();
                println!("{model}{tag}");
            }
            Ok(())
        }
        Commands::Test => {
            let endpoint = selected(&registry)?;
            let transport = HttpTransport::new(config.timeouts())?;
            let message = transport
                .test_connection(endpoint)
                .await
                .context("connection test failed")?;
            println!("{message}");
            Ok(())
        }
        Commands::Send {
            prompt,
            system,
            model,
            no_stream,
            temperature,
            max_tokens,
            thinking,
            effort,
            budget,
            max_completion_tokens,
        } => {
            let endpoint = selected(&registry)?.clone();
            let model = model.unwrap_or_else(|| endpoint.model.clone());
            if model.trim().is_empty() {
                bail!("no model set: pass --model or save the endpoint with --model");
            }

            let mut request =
                GenerationRequest::new(model.clone(), prompt_messages(system.as_deref(), &prompt))
                    .with_temperature(temperature)
                    .with_max_tokens(max_tokens)
                    .with_stream(!no_stream);
            if let Some(provider) = detect_provider(&model) {
                eprintln!("reasoning model: {}", provider.display_name());
                request = request.with_reasoning(ReasoningConfig {
                    enable_thinking: thinking,
                    reasoning_effort: effort,
                    max_completion_tokens,
                    thinking_budget_tokens: budget,
                });
            }

            let transport = HttpTransport::new(config.timeouts())?;
            let mut controller =
                GenerationController::new(Arc::new(transport), config.error_dismiss());
            if config.history_enabled {
                let history = {
                    let path = modelcurl::resolve_history_path()
                        .context("create data directory failed")?;
                    HistoryStore::open(&path).context("open history failed")?
                };
                controller = controller.with_history(Arc::new(Mutex::new(history)), config.history_limit);
            }

            run_send(Arc::new(controller), endpoint, request).await
        }
        Commands::History { action } => {
            let history = {
                let path =
                    modelcurl::resolve_history_path().context("create data directory failed")?;
                HistoryStore::open(&path).context("open history failed")?
            };
            match action {
                HistoryAction::List { limit } => {
                    for entry in history.list(limit.unwrap_or(config.history_limit))? {
                        println!(
                            "{}  {} / {}  {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            entry.endpoint_name,
                            entry.model,
                            format_metrics(&entry.metrics)
                        );
                        println!("  > {}", first_line(&entry.prompt));
                        println!("  < {}", first_line(&entry.response));
                    }
                }
                HistoryAction::Clear => {
                    history.clear()?;
                    println!("History cleared");
                }
            }
            Ok(())
        }
    }
}

async fn run_endpoints(registry: &mut EndpointRegistry, action: EndpointAction) -> Result<()> {
    match action {
        EndpointAction::List => {
            if registry.list().is_empty() {
                println!("No endpoints saved. Add one with: modelcurl endpoints add --name ... --url ...");
            }
            let selected = registry.selected().map(|e| e.id.clone());
            for ep in registry.list() {
                let marker = if selected.as_deref() == Some(ep.id.as_str()) { "*" } else { " " };
                println!("{marker} {}  {}  {}  {}", ep.id, ep.name, ep.url, ep.model);
            }
        }
        EndpointAction::Add {
            name,
            url,
            api_key,
            model,
            headers,
        } => {
            let endpoint = Endpoint {
                id: String::new(),
                name,
                url,
                api_key,
                headers,
                model,
            };
            let saved = registry.save(endpoint).await.context("save endpoint failed")?;
            println!("Saved endpoint id={} ({} | {})", saved.id, saved.name, saved.url);
        }
        EndpointAction::Remove { id } => {
            let id = find_endpoint(registry, &id)?.id.clone();
            registry.delete(&id).await.context("delete endpoint failed")?;
            println!("Removed endpoint {id}");
        }
        EndpointAction::Duplicate { id } => {
            let original = find_endpoint(registry, &id)?.clone();
            let copy = registry
                .duplicate(&original)
                .await
                .context("duplicate endpoint failed")?;
            println!("Saved endpoint id={} ({})", copy.id, copy.name);
        }
    }
    Ok(())
}

/// Run the request while echoing the answer text as it accumulates.
async fn run_send(
    controller: Arc<GenerationController>,
    endpoint: Endpoint,
    request: GenerationRequest,
) -> Result<()> {
    let mut run = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run(&endpoint, request).await })
    };

    let mut stdout = std::io::stdout();
    let mut printed = 0usize;
    let mut ticker = tokio::time::interval(Duration::from_millis(50));

    let result = loop {
        tokio::select! {
            joined = &mut run => break joined.context("generation task failed")?,
            _ = ticker.tick() => {
                let text = controller.response_text();
                if text.len() > printed {
                    write!(stdout, "{}", &text[printed..])?;
                    stdout.flush()?;
                    printed = text.len();
                }
            }
        }
    };

    let view = controller.snapshot();
    if view.text.len() > printed {
        write!(stdout, "{}", &view.text[printed..])?;
    }
    writeln!(stdout)?;

    if !view.reasoning.is_empty() {
        eprintln!("\n--- reasoning ---\n{}", view.reasoning);
    }
    if let Some(blocks) = view.response.as_ref().and_then(|r| r.thinking_blocks.as_ref()) {
        for (i, block) in blocks.iter().enumerate() {
            eprintln!("\n--- thinking block {} ---", i + 1);
            if let Some(summary) = &block.summary {
                eprintln!("summary: {summary}");
            }
            eprintln!("{}", block.content);
        }
    }

    let outcome = result?;
    eprintln!("\n{}", format_metrics(&outcome.metrics));
    if let Some(usage) = outcome.response.as_ref().and_then(|r| r.usage) {
        let reasoning = usage
            .reasoning_tokens
            .map(|n| format!(", reasoning {n}"))
            .unwrap_or_default();
        eprintln!(
            "usage: prompt {}, completion {}, total {}{reasoning}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
    Ok(())
}

fn selected(registry: &EndpointRegistry) -> Result<&Endpoint> {
    registry
        .selected()
        .context("no endpoints saved; add one with: modelcurl endpoints add --name ... --url ...")
}

fn find_endpoint<'a>(registry: &'a EndpointRegistry, wanted: &str) -> Result<&'a Endpoint> {
    registry
        .get(wanted)
        .or_else(|| {
            registry
                .list()
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(wanted))
        })
        .with_context(|| format!("no endpoint with id or name '{wanted}'"))
}

fn format_metrics(m: &PerformanceMetrics) -> String {
    let mut parts = vec![
        format!("TTFT {:.1}ms", m.ttft_ms),
        format!("latency {:.1}ms", m.total_latency_ms),
        format!("tokens {}", m.total_tokens),
    ];
    if let Some(tpot) = m.avg_tpot_ms {
        parts.push(format!("TPOT {tpot:.1}ms"));
    }
    if let Some(tps) = m.tokens_per_second {
        parts.push(format!("{tps:.2} tok/s"));
    }
    parts.join(" | ")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

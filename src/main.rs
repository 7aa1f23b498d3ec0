//! Tangent - terminal AI assistant
//!
//! Binary entry point: wires configuration, the provider, the tool registry,
//! and the agent loop into an interactive chat.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use console::style;
use futures::{StreamExt, pin_mut};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use tangent_core::core::agent::confirmation::{self, ConfirmationHandler, SessionApprovals};
use tangent_core::llm::factory::create_generator;
use tangent_core::tools::builtins::register_builtin_tools;
use tangent_core::{
    AgentEvent, AgentRunner, ConfirmationDetails, ConfirmationOutcome, TangentConfig,
    ToolRegistry,
};

#[derive(Parser, Debug)]
#[command(
    name = "tangent",
    version,
    about = "Terminal AI assistant with tool calling"
)]
pub struct Cli {
    /// Model identifier (overrides tangent.toml)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Provider name: moonshot | kimi | openai
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Workspace root for file operations (defaults to the current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Approve every tool call without prompting
    #[arg(long, global = true)]
    pub auto_confirm: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive assistant session
    Chat,
    /// Single prompt mode: run one request to completion and exit
    Ask { prompt: Vec<String> },
    /// List the tools available to the model
    Tools,
}

/// Interactive y/a/n confirmation, with session always-allow memory.
/// Dangerous commands are prompted even when previously always-allowed.
struct CliConfirmation {
    approvals: Arc<SessionApprovals>,
}

#[async_trait]
impl ConfirmationHandler for CliConfirmation {
    async fn confirm(
        &self,
        tool_name: &str,
        details: &ConfirmationDetails,
    ) -> ConfirmationOutcome {
        let assessment = confirmation::assess(details, &self.approvals);
        if !assessment.requires_prompt() {
            return ConfirmationOutcome::ProceedOnce;
        }

        match details {
            ConfirmationDetails::ExecuteShell {
                command,
                root_command,
                ..
            } => {
                println!(
                    "{} {} ({})",
                    style("[SHELL]").yellow().bold(),
                    style(command).cyan(),
                    root_command
                );
                if assessment.dangerous {
                    println!(
                        "{} this command can modify your system",
                        style("warning:").red().bold()
                    );
                }
            }
            ConfirmationDetails::EditFile {
                file_path,
                file_diff,
                ..
            } => {
                println!(
                    "{} {}",
                    style("[EDIT]").blue().bold(),
                    style(file_path).cyan()
                );
                if let Some(diff) = file_diff {
                    println!("{diff}");
                }
            }
            ConfirmationDetails::Generic {
                kind, description, ..
            } => {
                println!(
                    "{} {} {}",
                    style("[TOOL]").green().bold(),
                    tool_name,
                    description.as_deref().unwrap_or(kind)
                );
            }
        }

        let choice = tokio::task::spawn_blocking(|| {
            dialoguer::Select::new()
                .with_prompt("Proceed?")
                .items(&["yes, once", "always for this tool", "no, cancel"])
                .default(0)
                .interact()
        })
        .await;

        let outcome = match choice {
            Ok(Ok(0)) => ConfirmationOutcome::ProceedOnce,
            Ok(Ok(1)) => ConfirmationOutcome::ProceedAlwaysTool,
            _ => ConfirmationOutcome::Cancel,
        };
        self.approvals.record(details, outcome);
        outcome
    }
}

async fn render_events(
    runner: &mut AgentRunner,
    input: String,
) -> Result<()> {
    let events = runner.run(input);
    pin_mut!(events);

    let mut stdout = tokio::io::stdout();
    let mut tools_run = 0usize;
    let mut tools_succeeded = 0usize;
    while let Some(event) = events.next().await {
        match event {
            AgentEvent::Content(chunk) => {
                stdout.write_all(chunk.as_bytes()).await?;
                stdout.flush().await?;
            }
            AgentEvent::ToolCallRequest(request) => {
                println!(
                    "\n{} {}({})",
                    style("[CALL]").magenta().bold(),
                    request.name,
                    request.args
                );
            }
            AgentEvent::ToolCallResponse(response) => {
                tools_run += 1;
                let (tag, color) = if response.is_success() {
                    tools_succeeded += 1;
                    ("[DONE]", console::Color::Green)
                } else {
                    ("[FAIL]", console::Color::Red)
                };
                println!(
                    "{} {} {}",
                    style(tag).fg(color).bold(),
                    response.name,
                    response
                        .display_content
                        .as_deref()
                        .unwrap_or_else(|| response.payload.content())
                );
            }
            AgentEvent::Finished { .. } => {
                println!();
            }
            AgentEvent::Error(message) => {
                println!("\n{} {message}", style("error:").red().bold());
            }
        }
    }
    if tools_run > 0 {
        println!(
            "{}",
            style(format!("{tools_succeeded}/{tools_run} tools succeeded")).dim()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let mut config = TangentConfig::load(&workspace)?;
    if let Some(model) = &cli.model {
        config.agent.model = model.clone();
    }
    if let Some(provider) = &cli.provider {
        config.agent.provider = provider.clone();
    }
    if cli.auto_confirm {
        config.agent.auto_confirm = true;
    }

    tracing::debug!(
        provider = %config.agent.provider,
        model = %config.agent.model,
        "configuration loaded"
    );

    let mut registry = ToolRegistry::with_policy(config.tools.filter_policy());
    register_builtin_tools(
        &mut registry,
        workspace.clone(),
        config.tools.max_output_bytes,
    )?;
    let registry = Arc::new(registry);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Tools => {
            for tool in registry.list_enabled() {
                println!(
                    "{}  {}",
                    style(tool.name()).bold(),
                    tool.description()
                );
            }
            return Ok(());
        }
        Commands::Ask { prompt } => {
            let mut runner = build_runner(&config, registry)?;
            render_events(&mut runner, prompt.join(" ")).await?;
        }
        Commands::Chat => {
            let mut runner = build_runner(&config, registry)?;
            println!(
                "{} model {} via {} (ctrl-d to exit)",
                style("tangent").bold(),
                config.agent.model,
                config.agent.provider
            );

            let stdin = BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            loop {
                print!("{} ", style(">").cyan().bold());
                use std::io::Write as _;
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "/quit" || input == "/exit" {
                    break;
                }

                let scheduler = runner.scheduler();
                let render = render_events(&mut runner, input.to_string());
                tokio::select! {
                    result = render => result?,
                    _ = tokio::signal::ctrl_c() => {
                        scheduler.abort_all();
                        println!("\n{}", style("aborted").red());
                    }
                }
            }
        }
    }

    Ok(())
}

fn build_runner(
    config: &TangentConfig,
    registry: Arc<ToolRegistry>,
) -> Result<AgentRunner> {
    let generator = create_generator(
        &config.agent.provider,
        config.agent.base_url.clone(),
    )?;
    let approvals = Arc::new(SessionApprovals::new());
    let confirmer = Arc::new(CliConfirmation {
        approvals: Arc::clone(&approvals),
    });
    let runner = AgentRunner::new(generator, registry, confirmer, config.agent.clone());
    runner.set_tool_output_handler(Arc::new(|call_id: &str, chunk: &str| {
        println!("{} {chunk}", style(format!("[{call_id}]")).dim());
    }));
    Ok(runner)
}

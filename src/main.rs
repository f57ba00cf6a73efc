//! TokenTerminator CLI - optimize prompts and watch the savings add up

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use token_terminator::{
    align::AlignMode,
    api::ApiConfig,
    config::Config,
    pipeline::{OptimizationPipeline, PipelineConfig, PipelineError, PipelineState},
    render::{Renderer, WaitSpinner},
    tokens::TokenEstimator,
    HttpCollaborator, SubmissionReport,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "token-terminator")]
#[command(about = "Submit prompts to the TokenTerminator optimization service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a single prompt and print the optimization report
    Submit {
        /// Prompt text, or a path when --file is set
        prompt: String,

        /// Read the prompt from a file
        #[arg(short, long)]
        file: bool,

        /// Alignment mode for the removed-text view (word, char)
        #[arg(short, long)]
        mode: Option<String>,

        /// Scale the savings projection to this many prompts
        #[arg(long)]
        scale: Option<u64>,

        /// Skip the removed-text highlight
        #[arg(long)]
        no_highlight: bool,
    },

    /// Submit prompts in a loop; savings accumulate across the session
    Interactive,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.parse().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Submit {
            prompt,
            file,
            mode,
            scale,
            no_highlight,
        } => {
            let config = load_config()?;
            cmd_submit(config, prompt, file, mode, scale, no_highlight).await
        }
        Commands::Interactive => {
            let config = load_config()?;
            cmd_interactive(config).await
        }
        Commands::Config(cmd) => cmd_config(cmd),
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load()?;
    config.validate()?;
    Ok(config)
}

fn build_pipeline(config: &Config) -> Result<OptimizationPipeline<HttpCollaborator>> {
    let collaborator = HttpCollaborator::new(ApiConfig {
        base_url: config.service.base_url.clone(),
        timeout_secs: config.service.timeout_secs,
    })?;

    Ok(OptimizationPipeline::new(
        collaborator,
        PipelineConfig {
            ad_threshold: config.pipeline.ad_threshold,
        },
    ))
}

fn parse_mode(value: &str) -> Result<AlignMode> {
    match value {
        "word" | "word_set" => Ok(AlignMode::WordSet),
        "char" | "char_greedy" => Ok(AlignMode::CharGreedy),
        other => anyhow::bail!("unknown alignment mode '{other}' (expected word or char)"),
    }
}

async fn cmd_submit(
    config: Config,
    prompt: String,
    file: bool,
    mode: Option<String>,
    scale: Option<u64>,
    no_highlight: bool,
) -> Result<()> {
    let prompt = if file {
        std::fs::read_to_string(&prompt)?
    } else {
        prompt
    };
    let mode = match mode {
        Some(value) => parse_mode(&value)?,
        None => config.display.align_mode,
    };
    let factor = scale.unwrap_or(config.pipeline.projection_factor);

    let renderer = Renderer::new();
    if let Ok(estimator) = TokenEstimator::new() {
        renderer.render_info(&format!("prompt is ~{} tokens", estimator.count(&prompt)));
    }

    let pipeline = build_pipeline(&config)?;
    let outcome = run_submission(&pipeline, &prompt).await;
    render_outcome(
        &renderer,
        &pipeline,
        &config,
        outcome,
        mode,
        factor,
        no_highlight,
    );

    Ok(())
}

async fn cmd_interactive(config: Config) -> Result<()> {
    let renderer = Renderer::new();
    let pipeline = build_pipeline(&config)?;
    let mut mode = config.display.align_mode;

    renderer.render_info("TokenTerminator interactive session");
    renderer.render_info("Commands: /stats, /mode word|char, /reset, /quit");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/stats" => {
                renderer.render_ledger(&pipeline.ledger(), config.pipeline.projection_factor)
            }
            "/reset" => match pipeline.start_session() {
                Ok(()) => renderer.render_success("session reset"),
                Err(err) => renderer.render_error(&err.to_string()),
            },
            command if command.starts_with("/mode") => {
                match command.split_whitespace().nth(1).map(parse_mode) {
                    Some(Ok(parsed)) => {
                        mode = parsed;
                        renderer.render_success(&format!("alignment mode set to {:?}", mode));
                    }
                    _ => renderer.render_error("usage: /mode word|char"),
                }
            }
            command if command.starts_with('/') => {
                renderer.render_error(&format!("unknown command: {command}"))
            }
            prompt => {
                let outcome = run_submission(&pipeline, prompt).await;
                render_outcome(
                    &renderer,
                    &pipeline,
                    &config,
                    outcome,
                    mode,
                    config.pipeline.projection_factor,
                    false,
                );
            }
        }
    }

    renderer.render_ledger(&pipeline.ledger(), config.pipeline.projection_factor);
    Ok(())
}

/// Drive one submission, keeping the spinner message in step with the
/// pipeline state.
async fn run_submission(
    pipeline: &OptimizationPipeline<HttpCollaborator>,
    prompt: &str,
) -> Result<SubmissionReport, PipelineError> {
    let mut spinner = WaitSpinner::new();
    spinner.start("optimizing prompt");

    let mut states = pipeline.subscribe();
    let submit = pipeline.submit(prompt);
    tokio::pin!(submit);

    loop {
        tokio::select! {
            outcome = &mut submit => {
                spinner.stop();
                return outcome;
            }
            changed = states.changed() => {
                if changed.is_ok() && *states.borrow() == PipelineState::Analyzing {
                    spinner.update("scoring answers");
                }
            }
        }
    }
}

fn render_outcome(
    renderer: &Renderer,
    pipeline: &OptimizationPipeline<HttpCollaborator>,
    config: &Config,
    outcome: Result<SubmissionReport, PipelineError>,
    mode: AlignMode,
    factor: u64,
    no_highlight: bool,
) {
    let markdown = config.display.markdown_answers;

    match outcome {
        Ok(report) => {
            if !no_highlight {
                if let Some(spans) = pipeline.highlight_prompt(mode) {
                    renderer.render_highlight("Prompt (removed text struck out):", &spans);
                }
            }
            renderer.render_answer(
                "Original answer:",
                &report.optimization.original_answer,
                markdown,
            );
            renderer.render_answer(
                "Optimized answer:",
                &report.optimization.optimized_answer,
                markdown,
            );
            renderer.render_analysis_line(&report.analysis, report.optimization.is_cached);
            renderer.render_ledger(&report.ledger, factor);
            if report.ad_fired {
                renderer.render_info("Sponsor break: this session hit the ad threshold.");
            }
        }
        Err(PipelineError::Analyze(err)) => {
            renderer.render_error(&format!("could not score the answers: {err}"));
            // The answers were fetched before scoring failed; show them.
            if let Some(optimization) = pipeline.latest_optimization() {
                renderer.render_answer("Original answer:", &optimization.original_answer, markdown);
                renderer.render_answer(
                    "Optimized answer:",
                    &optimization.optimized_answer,
                    markdown,
                );
                renderer.render_info("savings were not recorded for this submission");
            }
        }
        Err(err) => renderer.render_error(&format!("submission failed: {err}")),
    }
}

fn cmd_config(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            let path = Config::default_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = Config::load()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", Config::default_path().display());
            Ok(())
        }
    }
}

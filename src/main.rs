use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use page_pilot::action::{ActionClassifier, strategy_by_name};
use page_pilot::analyzer::{AnalysisResult, AnalyzerConfig, PageAnalyzer};
use page_pilot::browser::{ChromiumConfig, ChromiumLauncher, Launcher, MockLauncher, MockSite};
use page_pilot::config;
use page_pilot::generator::{CaseOrigin, TestCaseGenerator, fallback_test_cases};
use page_pilot::llm::{LlmApi, LlmClient, LlmConfig};
use page_pilot::report::Report;
use page_pilot::runner::{RunnerConfig, TestCase, TestResult, TestRunner};
use page_pilot::session::Session;

/// Page Pilot - infer, generate and replay UI tests for a web page
#[derive(Parser, Debug)]
#[command(
    name = "page-pilot",
    about = "Infer interactive elements on a web page, generate test cases with a language model, and replay them",
    after_help = "ENVIRONMENT VARIABLES:\n\
        PAGE_PILOT_LLM_ENDPOINT          LLM endpoint URL\n\
        PAGE_PILOT_LLM_MODEL             LLM model name\n\
        PAGE_PILOT_LLM_API               ollama or openai\n\
        PAGE_PILOT_RESULTS_DIR           Artifact directory\n\
        PAGE_PILOT_NAV_TIMEOUT           Navigation bound (seconds)\n\
        PAGE_PILOT_STEP_TIMEOUT          Step bound (seconds)\n\
        PAGE_PILOT_HEADLESS              false shows the browser window\n\
        PAGE_PILOT_RESET_BETWEEN_TESTS   Re-navigate before every test case\n\
        RUST_LOG                         Log filter (default: info)\n\n\
        EXIT CODES:\n\
        0  all tests passed\n\
        1  at least one test failed\n\
        2  fatal error (navigation, launch, I/O)"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a page and print the inferred actions
    Analyze {
        #[command(flatten)]
        common: CommonArgs,

        /// Output the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan a page and ask the language model for test cases
    Generate {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Replay test cases against a page and write reports
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Test case JSON file; one test per inferred action when omitted
        #[arg(short, long)]
        tests: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze, generate, run and report in one go
    Pilot {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        llm: LlmArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Target page URL
    #[arg(short, long)]
    url: String,

    /// Directory for screenshots and reports
    #[arg(short, long, env = "PAGE_PILOT_RESULTS_DIR", default_value = "results")]
    output: PathBuf,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Re-navigate to the URL before every test case
    #[arg(long)]
    reset_between_tests: bool,

    /// Fill values: sample (sample_<type>_<index>) or realistic (format-valid)
    #[arg(long, env = "PAGE_PILOT_VALUE_STRATEGY", default_value = "sample")]
    value_strategy: String,

    /// Maximum number of candidate elements considered
    #[arg(long, env = "PAGE_PILOT_MAX_ELEMENTS", default_value_t = 200)]
    max_elements: usize,

    /// Replay against a scripted site (JSON) instead of launching Chromium
    #[arg(long, value_name = "SITE_JSON")]
    dry_run: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// Model name
    #[arg(long, env = "PAGE_PILOT_LLM_MODEL", default_value = "llama3")]
    model: String,

    /// Endpoint URL
    #[arg(long, env = "PAGE_PILOT_LLM_ENDPOINT", default_value = "http://localhost:11434/api/generate")]
    endpoint: String,

    /// Wire format: ollama or openai
    #[arg(long, env = "PAGE_PILOT_LLM_API", default_value = "ollama")]
    api: String,

    /// Attach the analysis screenshot to the request
    #[arg(long)]
    attach_screenshot: bool,
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Commands::Analyze { common, .. }
            | Commands::Generate { common, .. }
            | Commands::Run { common, .. }
            | Commands::Pilot { common, .. } => common,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Pick the browser backend, then run the command with it.
async fn dispatch(command: Commands) -> Result<ExitCode> {
    let common = command.common();
    match &common.dry_run {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let site = MockSite::from_json(&json)
                .with_context(|| format!("invalid site description {}", path.display()))?;
            execute(&MockLauncher::new(site), &command).await
        }
        None => {
            let headless = !common.headed && config::get().run.headless;
            let launcher = ChromiumLauncher::new(ChromiumConfig::default().headless(headless));
            execute(&launcher, &command).await
        }
    }
}

async fn execute<L: Launcher>(launcher: &L, command: &Commands) -> Result<ExitCode> {
    let common = command.common();
    let session = Session::in_dir(&common.output).for_url(&common.url);
    session
        .init()
        .with_context(|| format!("failed to create {}", session.dir.display()))?;

    let Some(strategy) = strategy_by_name(&common.value_strategy) else {
        bail!("unknown value strategy '{}' (expected sample or realistic)", common.value_strategy);
    };
    let analyzer = PageAnalyzer::new(
        AnalyzerConfig::default()
            .max_elements(common.max_elements)
            .screenshot_path(session.capture_path()),
    )
    .with_classifier(ActionClassifier::new(strategy));

    let runner = TestRunner::new(
        RunnerConfig::default()
            .artifacts_dir(&session.dir)
            .reset_between_tests(common.reset_between_tests || config::get().run.reset_between_tests),
    );

    match command {
        Commands::Analyze { json, .. } => {
            let analysis = analyze(&analyzer, launcher, &common.url).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Generate { llm, .. } => {
            let analysis = analyze(&analyzer, launcher, &common.url).await?;
            let cases = generate(llm, &analysis).await?;
            println!("{}", serde_json::to_string_pretty(&cases)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run { tests, json, .. } => {
            let cases = match tests {
                Some(path) => {
                    let text = std::fs::read_to_string(path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str::<Vec<TestCase>>(&text)
                        .with_context(|| format!("invalid test case file {}", path.display()))?
                }
                None => {
                    let analysis = analyze(&analyzer, launcher, &common.url).await?;
                    fallback_test_cases(&analysis.actions)
                }
            };
            run(&runner, launcher, &common.url, &cases, &session, *json).await
        }

        Commands::Pilot { llm, json, .. } => {
            let analysis = analyze(&analyzer, launcher, &common.url).await?;
            let cases = generate(llm, &analysis).await?;
            run(&runner, launcher, &common.url, &cases, &session, *json).await
        }
    }
}

async fn analyze<L: Launcher>(analyzer: &PageAnalyzer, launcher: &L, url: &str) -> Result<AnalysisResult> {
    analyzer
        .analyze(launcher, url)
        .await
        .with_context(|| format!("analysis of {} failed", url))
}

async fn generate(args: &LlmArgs, analysis: &AnalysisResult) -> Result<Vec<TestCase>> {
    let Some(api) = LlmApi::parse(&args.api) else {
        bail!("unknown LLM API '{}' (expected ollama or openai)", args.api);
    };
    let client = LlmClient::new(
        LlmConfig::new(&args.endpoint)
            .model(&args.model)
            .api(api),
    )
    .context("failed to build LLM client")?;

    let generated = TestCaseGenerator::new(&client)
        .attach_screenshot(args.attach_screenshot)
        .generate(analysis)
        .await;
    if let CaseOrigin::Fallback { reason } = &generated.origin {
        eprintln!("Model output unusable ({}); using one test per inferred action", reason);
    }
    Ok(generated.cases)
}

async fn run<L: Launcher>(
    runner: &TestRunner,
    launcher: &L,
    url: &str,
    cases: &[TestCase],
    session: &Session,
    json: bool,
) -> Result<ExitCode> {
    let results = runner
        .run(launcher, url, cases)
        .await
        .with_context(|| format!("run against {} failed", url))?;

    let report = Report::new(results);
    report
        .write(session)
        .with_context(|| format!("failed to write reports to {}", session.dir.display()))?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_results(&report.results);
        let s = &report.summary;
        println!();
        println!("{} passed, {} failed, {} total ({:.2}s)", s.passed, s.failed, s.total, s.duration);
        println!("Reports: {}", session.dir.display());
    }

    Ok(if report.summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_analysis(analysis: &AnalysisResult) {
    println!("Title: {}", analysis.title);
    println!("URL: {}", analysis.url);
    println!("Screenshot: {}", analysis.screenshot.display());
    println!("Actions ({}):", analysis.actions.len());
    for action in &analysis.actions {
        println!("  {}", action);
    }
}

fn print_results(results: &[TestResult]) {
    for r in results {
        let mark = if r.passed() { "PASS" } else { "FAIL" };
        println!("[{}] {} {} ({:.2}s)", mark, r.id, r.description, r.duration);
        if let Some(error) = &r.error {
            println!("       {}", error);
        }
    }
}

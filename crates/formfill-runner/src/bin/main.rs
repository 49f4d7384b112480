use clap::Parser;
use formfill_runner::{BrowserOptions, Document, LiveSession, Params, Preset, RunResult, Runner};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "formfill-runner")]
#[command(about = "Fill forms from YAML presets")]
#[command(version)]
struct Cli {
    /// Preset file to run
    preset: PathBuf,

    /// Fill a local HTML file
    #[arg(long, conflicts_with = "url", required_unless_present_any = ["url", "check"])]
    html: Option<PathBuf>,

    /// Fill a live page in the browser
    #[arg(long)]
    url: Option<String>,

    /// Run the browser headless (with --url)
    #[arg(long)]
    headless: bool,

    /// Proxy server for the browser, e.g. http://127.0.0.1:8080 (with --url)
    #[arg(long, requires = "url")]
    proxy: Option<String>,

    /// Override the browser's user agent (with --url)
    #[arg(long, requires = "url")]
    user_agent: Option<String>,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate the preset without running
    #[arg(long)]
    check: bool,

    /// Print the filled document (with --html)
    #[arg(long)]
    print_html: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> formfill_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = Params::from_args(&cli.params)?;
    let preset = Preset::load_with_params(&cli.preset, &params)?;

    if cli.check {
        println!("Preset valid: {}", preset.name);
        println!("  Scope: {}", preset.url_scope);
        println!("  Auto submit: {}", preset.auto_submit);
        println!("  Fields: {}", preset.fields.len());
        for field in &preset.fields {
            println!(
                "    - {} [{}] {:?} ({})",
                field.id,
                field.field_type,
                field.locator,
                field.generator.as_deref().unwrap_or("static")
            );
        }
        if !preset.params.is_empty() {
            println!("  Parameters: {}", preset.params.len());
            for (name, def) in &preset.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        return Ok(());
    }

    println!("Running: {}", preset.name);
    let runner = Runner::new();

    let result = if let Some(url) = &cli.url {
        let options = BrowserOptions {
            headless: cli.headless,
            proxy: cli.proxy.clone(),
            user_agent: cli.user_agent.clone(),
        };
        let session = LiveSession::launch(&options).await?;
        session.goto(url).await?;
        let result = runner.run_live(&session, &preset).await;
        session.close().await?;
        result?
    } else if let Some(path) = &cli.html {
        let mut doc = Document::parse(&std::fs::read_to_string(path)?);
        let result = runner.run(&mut doc, &preset).await;
        if cli.print_html {
            println!("{}", doc.to_html());
        }
        result
    } else {
        return Err(formfill_runner::Error::PageNotReady);
    };

    print_result(&result);

    if !result.success() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_result(result: &RunResult) {
    println!();
    for outcome in &result.outcomes {
        match outcome.failure_reason {
            None => println!("✓ {} ({})", outcome.field_id, outcome.locator_tried),
            Some(reason) => println!(
                "✗ {} ({}): {}",
                outcome.field_id, outcome.locator_tried, reason
            ),
        }
    }
    println!();
    println!(
        "  Filled: {}/{}",
        result.matched(),
        result.outcomes.len()
    );
    if result.submitted {
        println!("  Submitted");
    }
    println!("  Duration: {}ms", result.duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_flags_need_url() {
        let cli = Cli::try_parse_from([
            "formfill-runner",
            "signup.yaml",
            "--url",
            "https://example.com/signup",
            "--proxy",
            "http://127.0.0.1:8080",
            "--user-agent",
            "formfill-test",
        ])
        .unwrap();
        assert_eq!(cli.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(cli.user_agent.as_deref(), Some("formfill-test"));

        let local = Cli::try_parse_from([
            "formfill-runner",
            "signup.yaml",
            "--html",
            "signup.html",
            "--proxy",
            "http://127.0.0.1:8080",
        ]);
        assert!(local.is_err());
    }
}

//! mobile-deploy CLI - Scaffold a pytest + Appium project for a mobile app

use anyhow::Result;
use clap::Parser;
use deployer_core::{DeployError, DeploySettings, DeploymentRequest, Platform, StageError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mobile-deploy")]
#[command(about = "Build a mobile app and generate a UI-test automation project for it")]
#[command(version)]
#[command(after_help = "Examples:
  mobile-deploy --app-path ~/Projects/Foo
  mobile-deploy --app-path ~/Projects/Foo --output-dir ~/Automation
  mobile-deploy --app-path ~/Projects/Foo --app-name Shop
  mobile-deploy --app-path ~/Projects/Foo --skip-build --skip-venv")]
pub struct Args {
    /// App source: an Xcode project directory or a built .app bundle
    #[arg(long = "app-path")]
    pub app_path: PathBuf,

    /// Directory the project is created in (default: next to the app)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Name for the project directory and the app_name placeholder
    #[arg(long = "app-name")]
    pub app_name: Option<String>,

    /// Target platform
    #[arg(long, default_value = "ios")]
    pub platform: Platform,

    /// Use an existing build instead of running the toolchain
    #[arg(long = "skip-build")]
    pub skip_build: bool,

    /// Do not create a Python virtual environment
    #[arg(long = "skip-venv")]
    pub skip_venv: bool,

    /// Stream build output and enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Local directory to use for templates instead of the built-in set (for development use)
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,

    /// Build timeout in seconds
    #[arg(long = "build-timeout")]
    pub build_timeout: Option<u64>,
}

impl Args {
    fn settings(&self) -> Result<DeploySettings> {
        let mut settings = DeploySettings::from_env()?;
        if let Some(dir) = &self.template_dir {
            settings.template_dir = Some(dir.clone());
        }
        if let Some(secs) = self.build_timeout {
            settings.build_timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }

    fn request(&self) -> Result<DeploymentRequest, DeployError> {
        DeploymentRequest::builder(self.app_path.clone())
            .output_dir(self.output_dir.clone())
            .app_name(self.app_name.clone())
            .platform(self.platform)
            .skip_build(self.skip_build)
            .skip_venv(self.skip_venv)
            .verbose(self.verbose)
            .build()
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "deployer_core=debug,info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = match args.request() {
        Ok(request) => request,
        Err(error) => {
            let err = StageError::from(error);
            eprintln!("Error: {}", err);
            return exit_code(err.exit_code());
        }
    };

    let result = deployer_core::run(request, settings).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => exit_code(err.exit_code()),
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

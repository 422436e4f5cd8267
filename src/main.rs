//! Binary entry point for the kiln CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use kiln::{
    BuildConfig, BuildError, Builder, CancelToken, NoopHook, ProvisionHook, ShellHook,
    SoftLayerClient, WriterUi,
};

mod cli;

use cli::{BuildCommand, Cli};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Build(command) => build_command(command).await,
    }
}

async fn build_command(_args: BuildCommand) -> Result<i32, CliError> {
    let config =
        BuildConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let profile = config
        .resolve()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let client = Arc::new(SoftLayerClient::new(
        profile.api_endpoint.clone(),
        profile.username.clone(),
        profile.api_key.clone(),
    ));
    let ui = Arc::new(WriterUi::new(io::stderr()));
    let hook: Arc<dyn ProvisionHook> = match &profile.provision_script {
        Some(script) => Arc::new(ShellHook::new(script.clone())),
        None => Arc::new(NoopHook),
    };

    let cancel = CancelToken::new();
    let watcher_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher_token.cancel();
        }
    });

    let builder = Builder::new(profile, client, ui, hook);
    let artifact = builder.run(cancel).await?;

    writeln!(io::stdout(), "{artifact}").ok();
    Ok(0)
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_renders_configuration_failures() {
        let mut buf = Vec::new();
        let err = CliError::Config(String::from("username must be specified"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(
            rendered.contains("configuration error: username must be specified"),
            "rendered: {rendered}"
        );
    }

    #[test]
    fn write_error_renders_build_failures() {
        let mut buf = Vec::new();
        let err = CliError::Build(BuildError::Cancelled);
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(rendered.contains("build cancelled"), "rendered: {rendered}");
    }
}

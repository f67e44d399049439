use clap::Parser;
use tracing_subscriber::EnvFilter;

use iv_domain::config::{Config, ConfigSeverity};
use iv_gateway::cli::{Cli, Command, ConfigAction};
use iv_gateway::{api, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load(&cli.config)?;
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Validate => {
                let issues = config.validate();
                for issue in &issues {
                    let label = match issue.severity {
                        ConfigSeverity::Error => "error",
                        ConfigSeverity::Warning => "warning",
                    };
                    println!("{label}: {issue}");
                }
                if issues
                    .iter()
                    .any(|i| i.severity == ConfigSeverity::Error)
                {
                    std::process::exit(1);
                }
                println!("configuration ok");
                Ok(())
            }
        },
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = bootstrap::build(config)?;
    let addr = format!(
        "{}:{}",
        state.config.server.bind, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "control-plane API listening");
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,iv_gateway=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

use clap::Parser;
use exoquic_pg_setup::{Config, Result, Setup};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "exoquic-pg-setup")]
#[command(about = "Prepares PostgreSQL for Exoquic logical-replication CDC", long_about = None)]
struct Args {
    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 0,
        help = "Stay alive this long after printing the report"
    )]
    linger_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting Exoquic PostgreSQL configurator");

    let config = Config::from_env()
        .and_then(|config| config.validate().map(|()| config))
        .inspect_err(|e| error!("{}", e))?;

    info!(
        postgres_host = %config.postgres.host,
        postgres_port = config.postgres.port,
        postgres_database = %config.postgres.database,
        replication_user = %config.replication.user,
        publication = %config.replication.publication,
        slot = %config.replication.slot_name,
        tables = ?config.replication.tables,
        cloud_registration = config.cloud.api_key.is_some(),
        "Configuration summary"
    );

    let report = Setup::new(config)
        .run()
        .await
        .inspect_err(|e| error!("Setup aborted: {}", e))?;

    println!("\n{}", report);

    if args.linger_secs > 0 {
        info!(
            "Configuration successful. Exiting in {} seconds.",
            args.linger_secs
        );
        tokio::time::sleep(Duration::from_secs(args.linger_secs)).await;
    } else {
        info!("Configuration successful");
    }

    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("exoquic_pg_setup=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("exoquic_pg_setup=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

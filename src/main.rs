use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use form_spammer::{
    extract_fields, report, Args, Commands, FormClient, Generator, Result, Spammer, TargetArgs,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn scrape(target: &TargetArgs) -> Result<(FormClient, Generator)> {
    let client = FormClient::new(&target.url, Duration::from_secs(target.timeout))?;
    let page = client.fetch_page().await?;
    let fields = extract_fields(&page)?;
    info!(fields = fields.len(), "scraped form schema");
    let generator = Generator::new(fields, target.policy())?;
    Ok((client, generator))
}

async fn run(cli: Args) -> Result<()> {
    match cli.command {
        Commands::Spam {
            target,
            requests,
            workers,
            report: report_path,
        } => {
            report::print_parameters(&target.url, requests, workers, &target.policy());
            let (client, generator) = scrape(&target).await?;

            let spammer = Spammer::new(client, generator, workers);
            let stop = spammer.stop_handle();
            ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;

            let started_at = Local::now();
            let summary = spammer.run(requests).await?;
            report::print_summary(&summary);

            if let Some(path) = report_path {
                report::write_csv(&path, &target.url, started_at, &summary)?;
                info!(path = %path.display(), "wrote report");
            }
        }
        Commands::Inspect { target } => {
            let (_, generator) = scrape(&target).await?;
            for field in generator.fields() {
                let validation = field
                    .validation
                    .as_ref()
                    .map(|v| format!("{:?}/{:?} {:?}", v.kind, v.sub_kind, v.args))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "entry.{:<12} {:<20} required={:<5} choices={:<3} {} {:?}",
                    field.id,
                    format!("{:?}", field.kind),
                    field.required,
                    field.choices.len(),
                    validation,
                    field.name
                );
            }

            let sample = generator.generate(&mut rand::rng())?;
            println!();
            for (key, answer) in &sample.payload {
                println!("{key} = {:?}", answer.values());
            }
        }
    }
    Ok(())
}

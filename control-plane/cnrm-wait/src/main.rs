use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cnrm_wait::cli::WaitArgs;
use cnrm_wait::config::WaitConfig;
use cnrm_wait::store::KubeStore;
use cnrm_wait::{Coordinator, ProgressPrinter, init_tracing};
use envconfig::Envconfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing("cnrm_wait=info");

    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let args = WaitArgs::parse();
    let cfg = args.apply_overrides(WaitConfig::init_from_env()?.apply_profile_defaults());
    info!(?cfg, "Starting cnrm-wait");

    let registry = args.build_registry().await?;
    if args.print_groups {
        print!("{}", registry);
    }

    let store = Arc::new(KubeStore::try_default().await?);
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; cancelling wait");
                cancel.cancel();
            }
        });
    }

    let mut coordinator = Coordinator::new(store, cfg.watch_settings())
        .with_printer(ProgressPrinter::stdout(cfg.color.unwrap_or(true)));
    let report = coordinator.wait(registry, cancel).await;

    if report.is_success() {
        info!(resources = report.total, elapsed = ?report.elapsed, "all resources ready");
        return Ok(ExitCode::SUCCESS);
    }
    report.write_failures(std::io::stdout().lock())?;
    Ok(ExitCode::FAILURE)
}

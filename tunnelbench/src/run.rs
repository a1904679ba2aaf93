use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use tunnelbench_core::{RunConfig, TargetUrl, TunnelClient, run_load};

use crate::cli::Cli;
use crate::output;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let target = TargetUrl::parse(&cli.url).with_context(|| format!("invalid --url: {}", cli.url))?;

    // Floors mirror the flag defaults: a run always has at least one worker
    // and a timeout long enough to mean something.
    let concurrency = cli.concurrency.max(1);
    let timeout = cli.timeout.max(Duration::from_millis(100));

    let client = Arc::new(TunnelClient::new(
        cli.proxy_host.clone(),
        cli.proxy_port,
        timeout,
    ));
    let target = Arc::new(target);

    let cfg = RunConfig {
        concurrency,
        duration: cli.duration,
        requests: cli.requests,
        top_errors: cli.show_errors,
    };

    let summary = run_load(cfg, move || {
        let client = client.clone();
        let target = target.clone();
        async move { client.execute(&target).await }
    })
    .await
    .context("load run failed")?;

    print!("{}", output::human::render(&cli, &summary));
    if cli.json {
        output::json::emit(&cli, &summary)?;
    }

    Ok(())
}

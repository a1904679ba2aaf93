use std::io::Write as _;

use serde::Serialize;

use tunnelbench_core::RunSummary;

use crate::cli::Cli;

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub url: &'a str,
    pub proxy_host: &'a str,
    pub proxy_port: u16,
    pub concurrency: u64,
    pub timeout_s: f64,
    pub requests: u64,
    pub ok: u64,
    pub errors: u64,
    pub duration_s: f64,
    pub rps: f64,
    pub latency_ms: JsonLatency,
    pub top_errors: Vec<JsonErrorCount<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatency {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonErrorCount<'a> {
    pub error: &'a str,
    pub count: u64,
}

pub(crate) fn build_line<'a>(cli: &'a Cli, summary: &'a RunSummary) -> JsonSummaryLine<'a> {
    JsonSummaryLine {
        kind: "http_connect",
        url: &cli.url,
        proxy_host: &cli.proxy_host,
        proxy_port: cli.proxy_port,
        concurrency: cli.concurrency,
        timeout_s: cli.timeout.as_secs_f64(),
        requests: summary.requests,
        ok: summary.ok,
        errors: summary.errors,
        duration_s: summary.duration_s,
        rps: summary.rps,
        latency_ms: JsonLatency {
            p50: summary.p50_ms,
            p90: summary.p90_ms,
            p95: summary.p95_ms,
            p99: summary.p99_ms,
            p999: summary.p999_ms,
            max: summary.max_ms,
            mean: summary.mean_ms,
            stdev: summary.stdev_ms,
        },
        top_errors: summary
            .top_errors
            .iter()
            .map(|(error, count)| JsonErrorCount {
                error: error.as_str(),
                count: *count,
            })
            .collect(),
    }
}

pub(crate) fn emit(cli: &Cli, summary: &RunSummary) -> anyhow::Result<()> {
    let line = build_line(cli, summary);
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, &line)?;
    writeln!(out)?;
    Ok(())
}

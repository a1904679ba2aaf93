use std::fmt::Write as _;

use tunnelbench_core::RunSummary;

use crate::cli::Cli;

pub(crate) fn render(cli: &Cli, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== tunnelbench summary (HTTP CONNECT) ===\n");
    writeln!(&mut out, "url={}", cli.url).ok();
    writeln!(&mut out, "proxy={}:{}", cli.proxy_host, cli.proxy_port).ok();
    writeln!(
        &mut out,
        "requests={} ok={} errors={}",
        summary.requests, summary.ok, summary.errors
    )
    .ok();
    writeln!(
        &mut out,
        "duration_s={:.2} rps={:.1}",
        summary.duration_s, summary.rps
    )
    .ok();
    writeln!(
        &mut out,
        "latency_ms p50={:.2} p90={:.2} p95={:.2} p99={:.2} p99.9={:.2} max={:.2}",
        summary.p50_ms, summary.p90_ms, summary.p95_ms, summary.p99_ms, summary.p999_ms,
        summary.max_ms
    )
    .ok();
    writeln!(
        &mut out,
        "latency_ms mean={:.2} stdev={:.2}",
        summary.mean_ms, summary.stdev_ms
    )
    .ok();

    if !summary.top_errors.is_empty() {
        out.push_str("top_errors:\n");
        for (label, count) in &summary.top_errors {
            writeln!(&mut out, "  {count}x {label}").ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use clap::Parser as _;

    fn sample_summary() -> RunSummary {
        RunSummary {
            requests: 12,
            ok: 10,
            errors: 2,
            duration_s: 2.0,
            rps: 6.0,
            p50_ms: 51.0,
            p90_ms: 55.0,
            p95_ms: 56.5,
            p99_ms: 58.0,
            p999_ms: 58.9,
            max_ms: 59.0,
            mean_ms: 52.0,
            stdev_ms: 2.5,
            top_errors: vec![("http_status=503".to_string(), 2)],
        }
    }

    #[test]
    fn render_includes_counters_rates_and_ranked_errors() {
        let cli = Cli::try_parse_from([
            "tunnelbench",
            "--url",
            "http://127.0.0.1:18080/fast",
            "--requests",
            "12",
        ])
        .unwrap();

        let text = render(&cli, &sample_summary());

        assert!(text.starts_with("=== tunnelbench summary (HTTP CONNECT) ===\n"));
        assert!(text.contains("url=http://127.0.0.1:18080/fast\n"));
        assert!(text.contains("proxy=127.0.0.1:7890\n"));
        assert!(text.contains("requests=12 ok=10 errors=2\n"));
        assert!(text.contains("duration_s=2.00 rps=6.0\n"));
        assert!(text.contains("p99.9=58.90"));
        assert!(text.contains("top_errors:\n  2x http_status=503\n"));
    }

    #[test]
    fn empty_error_list_omits_the_section() {
        let cli = Cli::try_parse_from(["tunnelbench", "--url", "http://t/", "--requests", "1"])
            .unwrap();

        let mut summary = sample_summary();
        summary.top_errors.clear();

        let text = render(&cli, &summary);
        assert!(!text.contains("top_errors"));
    }
}

use std::time::Duration;

use clap::{ArgGroup, Parser};

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" => Ok(Duration::from_millis(value)),
        "m" | "min" | "mins" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tunnelbench",
    author,
    version,
    about = "Load generator for HTTP CONNECT forward proxies",
    long_about = "tunnelbench drives concurrent HTTP requests through a CONNECT forward proxy and reports throughput and latency percentiles.\n\nEvery request opens its own proxy connection, negotiates a CONNECT tunnel to the target URL's host, and sends a single GET through the tunnel. Per-request failures never abort a run; they surface as error counts in the summary.",
    after_help = "Examples:\n  tunnelbench --url http://127.0.0.1:18080/fast --requests 1000\n  tunnelbench --proxy-port 7890 --url 'http://127.0.0.1:18080/delay?ms=50' --duration 30s --concurrency 100\n  tunnelbench --url http://127.0.0.1:18080/fast --duration 10s --show-errors 5 --json",
    group(ArgGroup::new("stop").required(true).multiple(false))
)]
pub struct Cli {
    /// Proxy host to connect to
    #[arg(long, default_value = "127.0.0.1")]
    pub proxy_host: String,

    /// Proxy port
    #[arg(long, default_value_t = 7890)]
    pub proxy_port: u16,

    /// Target URL requested through the CONNECT tunnel, e.g. http://host:port/path
    #[arg(long)]
    pub url: String,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 200)]
    pub concurrency: u64,

    /// Stop starting new requests after this wall-clock duration (e.g. 10s, 1m)
    #[arg(long, value_parser = parse_duration, group = "stop")]
    pub duration: Option<Duration>,

    /// Stop after this many requests in total
    #[arg(long, group = "stop")]
    pub requests: Option<u64>,

    /// Per-request timeout (e.g. 5s, 500ms)
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub timeout: Duration,

    /// Print the top N error kinds
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub show_errors: usize,

    /// Additionally print a single-line JSON summary
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("5"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn exactly_one_stop_condition_is_required() {
        let neither = Cli::try_parse_from(["tunnelbench", "--url", "http://t/"]);
        assert!(neither.is_err());

        let both = Cli::try_parse_from([
            "tunnelbench",
            "--url",
            "http://t/",
            "--duration",
            "10s",
            "--requests",
            "100",
        ]);
        assert!(both.is_err());

        let requests_only =
            Cli::try_parse_from(["tunnelbench", "--url", "http://t/", "--requests", "100"]);
        assert!(requests_only.is_ok());
    }

    #[test]
    fn cli_parses_a_full_invocation() {
        let cli = match Cli::try_parse_from([
            "tunnelbench",
            "--proxy-host",
            "10.0.0.1",
            "--proxy-port",
            "8888",
            "--url",
            "http://127.0.0.1:18080/delay?ms=50",
            "--concurrency",
            "32",
            "--duration",
            "30s",
            "--timeout",
            "2s",
            "--show-errors",
            "5",
            "--json",
        ]) {
            Ok(cli) => cli,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.proxy_host, "10.0.0.1");
        assert_eq!(cli.proxy_port, 8888);
        assert_eq!(cli.concurrency, 32);
        assert_eq!(cli.duration, Some(Duration::from_secs(30)));
        assert_eq!(cli.requests, None);
        assert_eq!(cli.timeout, Duration::from_secs(2));
        assert_eq!(cli.show_errors, 5);
        assert!(cli.json);
    }
}

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut listen: IpAddr = "127.0.0.1".parse()?;
    let mut port: u16 = 18080;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--listen requires an address, e.g. 127.0.0.1"))?;
                listen = value.parse()?;
            }
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--port requires a port number"))?;
                port = value.parse()?;
            }
            "-h" | "--help" => {
                eprintln!(
                    "tunnelbench-testserver\n\nUSAGE:\n  tunnelbench-testserver [--listen 127.0.0.1] [--port 18080]\n\nServes the synthetic target endpoints (/fast, /delay, /bytes, /random-bytes, /status, /close) until interrupted."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(SocketAddr::new(listen, port)).await?;
    let addr = listener.local_addr()?;
    println!("target server listening on http://{addr}");

    tokio::select! {
        result = tunnelbench_testserver::serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = classcheck_rust::run_worker().await {
        eprintln!("classcheck-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = classcheck_rust::run().await {
        eprintln!("classcheck-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

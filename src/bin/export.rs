use clap::Parser;
use discovery_crawler::{
    config::{init_tracing, ExportArgs},
    export::export_results,
    get_now, Persistent,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = ExportArgs::parse();

    let p = Persistent::open(&args.database).await?;
    let (path, count) = export_results(&p, &args.output_dir, get_now().date_naive()).await?;
    println!("Wrote {} results to {}", count, path.display());
    Ok(())
}

use clap::Parser;
use discovery_crawler::{
    browser::HttpBrowser,
    company::load_companies,
    config::{init_tracing, CrawlArgs},
    run_crawler,
    session::SessionStore,
    sites, Persistent,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = CrawlArgs::parse();

    let input = match &args.input {
        Some(input) => input,
        None => {
            println!("Please provide a path to a csv file.");
            return Ok(());
        }
    };

    let companies = match load_companies(input) {
        Ok(companies) => companies,
        Err(e) => {
            error!("Cannot read companies from {}: {}", input.display(), e);
            return Ok(());
        }
    };

    let p = Persistent::open(&args.database).await?;
    let sites = args.select_sites(sites::registry(&args.credentials(), args.crawl_config().pacing));
    let sessions = SessionStore::for_sites(&args.session_dir, &sites);
    let browser = HttpBrowser::new(args.user_agent.clone());

    let summary = run_crawler(
        &browser,
        &p,
        &sessions,
        &sites,
        &companies,
        args.crawl_config(),
    )
    .await?;
    info!(
        "Crawled {} sites: {} searched, {} skipped, {} failed, {} results",
        summary.sites, summary.searched, summary.skipped, summary.failed, summary.results
    );
    Ok(())
}

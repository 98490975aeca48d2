use clap::{Parser, Subcommand};
use cms::prelude::*;
use harness::render;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Browse headless CMS content, falling back to bundled data when the CMS is down")]
struct Cli {
    /// CMS base URL
    #[arg(long, env = "CMS_BASE_URL", global = true)]
    base_url: Option<String>,
    /// Bearer token sent with every request
    #[arg(long, env = "CMS_API_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, env = "CMS_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,
    /// Report HTTP errors instead of substituting fallback data
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load articles, organizations and pages together, like the home page
    Load,
    /// List articles
    Articles {
        /// Only featured articles
        #[arg(short, long)]
        featured: bool,
        /// Maximum number of featured articles
        #[arg(short, long, default_value = "3")]
        limit: u32,
    },
    /// Show one article by slug
    Article { slug: String },
    /// List organizations
    Organizations,
    /// List pages
    Pages,
    /// Show one page by slug
    Page { slug: String },
    /// List cards
    Cards,
    /// Health check
    Health,
}

impl Cli {
    fn config(&self) -> CmsConfig {
        let mut config = CmsConfig::default();
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_api_token(token);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    fn policy(&self) -> FallbackPolicy {
        if self.strict {
            FallbackPolicy::network_only()
        } else {
            FallbackPolicy::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = CmsClient::new(cli.config())?;
    info!("Using CMS at {}", client.base_url());

    let gateway = Gateway::new(client).with_policy(cli.policy());

    match cli.command {
        Commands::Load => {
            let load = gateway.load_page().await;
            println!("Status: {}\n", load.status_message());
            println!(
                "{}\n",
                render::section("Articles", &load.articles, render::article_block)
            );
            println!(
                "{}\n",
                render::section(
                    "Organizations",
                    &load.organizations,
                    render::organization_block
                )
            );
            println!(
                "{}",
                render::section("Pages", &load.pages, render::page_block)
            );
        }
        Commands::Articles { featured, limit } => {
            let section: Section<Article> = if featured {
                gateway.load_featured(limit).await
            } else {
                gateway.load_collection().await
            };
            println!(
                "{}",
                render::section("Articles", &section, render::article_block)
            );
        }
        Commands::Article { slug } => {
            let found: Lookup<Article> = gateway.find_by_slug(&slug).await;
            show_lookup(&slug, found, |article| {
                format!(
                    "{}\n\n{}",
                    render::article_line(&article),
                    article.content.extract_text()
                )
            })?;
        }
        Commands::Organizations => {
            let section: Section<Organization> = gateway.load_collection().await;
            println!(
                "{}",
                render::section("Organizations", &section, render::organization_block)
            );
        }
        Commands::Pages => {
            let section: Section<Page> = gateway.load_collection().await;
            println!(
                "{}",
                render::section("Pages", &section, render::page_block)
            );
        }
        Commands::Page { slug } => {
            let found: Lookup<Page> = gateway.find_by_slug(&slug).await;
            show_lookup(&slug, found, |page| {
                format!("{}\n\n{}", page.title, page.content.extract_text())
            })?;
        }
        Commands::Cards => {
            let section = gateway.load_cards().await;
            println!(
                "{}",
                render::section("Cards", &section, render::card_block)
            );
        }
        Commands::Health => health_check(gateway.live()).await?,
    }

    Ok(())
}

fn show_lookup<E>(
    slug: &str,
    found: Lookup<E>,
    show: impl FnOnce(E) -> String,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Status: {}\n", found.source.status_message());
    match (found.item, found.source) {
        (Some(item), _) => {
            println!("{}", show(item));
            Ok(())
        }
        (None, DataSource::Unavailable { reason }) => Err(reason.into()),
        (None, _) => {
            println!("No entry with slug '{}'", slug);
            Ok(())
        }
    }
}

async fn health_check(client: &CmsClient) -> Result<(), Box<dyn std::error::Error>> {
    println!("Performing health check...");

    match client.health_check().await {
        Ok(()) => {
            println!("✓ Health check passed. CMS at {} is reachable.", client.base_url());
            info!("Health check successful");
        }
        Err(e) => {
            println!("✗ Health check failed: {}", e);
            error!("Health check failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

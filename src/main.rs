use actix::prelude::*;
use actix_web::middleware::{DefaultHeaders, NormalizePath, TrailingSlash};
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use catalog_types::Marketplace;
use listing_hub::catalog::service::CatalogService;
use listing_hub::config::{CatalogConfig, ServerConfig};
use listing_hub::control::{self, CatalogServices};
use listing_hub::upstream::build_client;
use listing_hub::{hepsiburada, temu, trendyol, CategoryCatalog, MarketplaceAdapter};
use log_error::LogError;
use reqwest_middleware::ClientWithMiddleware;
use std::env;
use std::sync::Arc;

fn adapter_from_env(
    marketplace: Marketplace,
    client: &ClientWithMiddleware,
) -> Option<Arc<dyn MarketplaceAdapter>> {
    let client = client.clone();
    let adapter: Arc<dyn MarketplaceAdapter> = match marketplace {
        Marketplace::Trendyol => Arc::new(trendyol::TrendyolAdapter::new(
            client,
            trendyol::Credentials::from_env()?,
        )),
        Marketplace::Hepsiburada => Arc::new(hepsiburada::HepsiburadaAdapter::new(
            client,
            hepsiburada::Credentials::from_env()?,
        )),
        Marketplace::Temu => Arc::new(temu::TemuAdapter::new(
            client,
            temu::Credentials::from_env()?,
        )),
    };
    Some(adapter)
}

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let server_config = ServerConfig::from_env()?;
    let client = build_client(server_config.http_timeout, server_config.upstream_rpm)
        .context("Unable to build upstream HTTP client")?;

    let mut services = CatalogServices::default();
    for marketplace in Marketplace::ALL {
        let Some(adapter) = adapter_from_env(marketplace, &client) else {
            log::warn!(
                "{marketplace}: credentials are not set, skipping (see {}_* variables)",
                marketplace.env_prefix()
            );
            continue;
        };
        let Some(config) = CatalogConfig::from_env(marketplace)
            .log_error(&format!("{marketplace}: invalid catalog settings"))
        else {
            continue;
        };
        log::info!(
            "{marketplace}: category TTL {:?}, attribute TTL {:?}, match cache TTL {:?}",
            config.tree_ttl,
            config.attribute_ttl(),
            config.match_cache_ttl
        );
        let catalog = Arc::new(CategoryCatalog::new(config, adapter));
        services.insert(marketplace, CatalogService::new(catalog).start());
    }
    if services.is_empty() {
        log::warn!("No marketplace is configured, every catalog route will answer 404");
    } else {
        log::info!(
            "Serving catalogs of {}",
            services
                .marketplaces()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    log::info!("Listening on {}", server_config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "*")),
            )
            .wrap(actix_web::middleware::Compress::default())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .app_data(Data::new(services.clone()))
            .configure(control::routes)
    })
    .bind(&server_config.bind_addr)
    .with_context(|| format!("Unable to bind {}", server_config.bind_addr))?
    .run()
    .await?;
    Ok(())
}

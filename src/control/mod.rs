use crate::catalog::service::CatalogService;
use actix::prelude::*;
use actix_web::http::StatusCode;
use actix_web::web::ServiceConfig;
use actix_web::{HttpResponse, ResponseError};
use catalog_types::{CatalogError, Marketplace};
use derive_more::{Display, Error};
use std::collections::HashMap;

pub mod catalog;

pub type Response = Result<HttpResponse, ControllerError>;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    #[error(ignore)]
    #[display("Marketplace {_0} is not configured")]
    UnknownMarketplace(String),
    Catalog(CatalogError),
    #[error(ignore)]
    InternalServerError(anyhow::Error),
}

impl From<CatalogError> for ControllerError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl From<actix::MailboxError> for ControllerError {
    fn from(err: actix::MailboxError) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ResponseError for ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownMarketplace(_) => StatusCode::NOT_FOUND,
            Self::Catalog(CatalogError::EmptyTitle) => StatusCode::BAD_REQUEST,
            Self::Catalog(CatalogError::InvalidLeaf(_)) => StatusCode::NOT_FOUND,
            Self::Catalog(CatalogError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Catalog(CatalogError::MalformedUpstreamData(_)) => StatusCode::BAD_GATEWAY,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        log::warn!("{self:?}");
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

/// Running catalog services by marketplace. Marketplaces without
/// credentials are absent.
#[derive(Clone, Default)]
pub struct CatalogServices(HashMap<Marketplace, Addr<CatalogService>>);

impl CatalogServices {
    pub fn insert(&mut self, marketplace: Marketplace, service: Addr<CatalogService>) {
        self.0.insert(marketplace, service);
    }

    pub fn get(&self, marketplace: &str) -> Result<&Addr<CatalogService>, ControllerError> {
        marketplace
            .parse::<Marketplace>()
            .ok()
            .and_then(|m| self.0.get(&m))
            .ok_or_else(|| ControllerError::UnknownMarketplace(marketplace.to_string()))
    }

    pub fn marketplaces(&self) -> impl Iterator<Item = &Marketplace> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(catalog::categories)
        .service(catalog::search)
        .service(catalog::prefetch)
        .service(catalog::match_category)
        .service(catalog::attributes)
        .service(catalog::prefetch_attributes)
        .service(catalog::status);
}

use std::sync::Arc;

use crate::application::admin::AdminService;
use crate::application::details::DetailService;
use crate::application::invalidation::InvalidationService;
use crate::application::links::LinkListingService;
use crate::application::metadata::MetadataService;
use crate::cache::Clock;

#[derive(Clone)]
pub struct ApiState {
    pub listing: Arc<LinkListingService>,
    pub details: Arc<DetailService>,
    pub admin: Arc<AdminService>,
    pub invalidation: Arc<InvalidationService>,
    pub metadata: Arc<MetadataService>,
    pub clock: Arc<dyn Clock>,
}

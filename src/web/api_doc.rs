use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::reporter::{IntervalRequest, PushResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::reporter::start,
        super::api::reporter::stop,
        super::api::reporter::status,
        super::api::reporter::set_interval,
        super::api::reporter::push_location,
    ),
    components(
        schemas(
            ErrorResponse,
            IntervalRequest,
            PushResponse,
            crate::reporter::ReporterMode,
            crate::reporter::ReporterStatus,
            crate::source::LocationSample,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "loc-o-mat Reporter API",
        description = "Control and status of the periodic location reporter",
        version = "0.1.0"
    ),
    tags(
        (name = "reporter", description = "Location reporting")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

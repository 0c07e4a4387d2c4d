//! # OpenAPI Document
//!
//! [`ApiDoc`] collects the utoipa-annotated handlers with their unprefixed
//! paths. The registrar rewrites it at startup to the versioned prefix and
//! attaches the security scheme, so it is never served as-is.

use utoipa::OpenApi;

/// OpenAPI description of the player routes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "waypoint API",
        description = "Player records behind an authenticated, traced request pipeline.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        crate::routes::players::list_players,
        crate::routes::players::get_player,
        crate::routes::players::create_player,
        crate::routes::players::update_player,
        crate::routes::players::delete_player,
    ),
    components(schemas(
        crate::routes::players::PlayerResponse,
        crate::routes::players::PlayerPage,
        crate::routes::players::CreatePlayerRequest,
        crate::routes::players::UpdatePlayerRequest,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "players", description = "Player records"),
    )
)]
pub struct ApiDoc;

/// Static page that renders `/{service}/openapi.json` in the browser.
pub fn docs_page(service: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <title>{service} APIs</title>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
  </head>
  <body>
    <script id="api-reference" data-url="/{service}/openapi.json"></script>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
  </body>
</html>
"#
    )
}

//! Scalar API reference page

use actix_web::http::header::ContentType;
use actix_web::HttpResponse;

/// Where the generated OpenAPI document is served.
pub const OPENAPI_URL: &str = "/api-docs/openapi.json";

const PAGE_TITLE: &str = "texture-press API";

/// Standalone page that loads the Scalar viewer from its CDN and points it at `spec_url`.
pub fn render(title: &str, spec_url: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <title>{title}</title>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
  </head>
  <body style="margin: 0">
    <script id="api-reference" data-url="{spec_url}"></script>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
  </body>
</html>
"#
    )
}

pub fn scalar_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(render(PAGE_TITLE, OPENAPI_URL))
}

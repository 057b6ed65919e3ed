//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{files, health};
use crate::data::files::{
    CreatedFolder, DeletedPath, DirectoryListing, PurgeResult, ResolvedPath, UploadedFile,
};
use crate::data::storage::paths::CacheCategory;
use crate::data::storage::{CacheStatus, StorageObject, TransferOutcome};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Filedeck API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Filesystem operations over a Bunny.net storage zone"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "files", description = "Files, folders and CDN cache")
    ),
    paths(
        // Health
        health::health,
        // Files
        files::list_files,
        files::download_file,
        files::upload_file,
        files::delete_path,
        files::create_folder,
        files::rename_path,
        files::move_path,
        files::check_cache,
        files::purge_cache,
        files::resolve_path,
    ),
    components(schemas(
        // Health
        health::HealthResponse,
        // Requests
        files::types::CreateFolderRequest,
        files::types::RenameRequest,
        files::types::MoveRequest,
        files::types::PurgeRequest,
        // Payloads
        StorageObject,
        CacheCategory,
        CacheStatus,
        DirectoryListing,
        UploadedFile,
        DeletedPath,
        CreatedFolder,
        TransferOutcome,
        PurgeResult,
        ResolvedPath,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Filedeck API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;

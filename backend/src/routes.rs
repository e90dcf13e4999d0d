use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::info;
use shared::{
    CreateListRequest, DeleteResponse, ProcessImageResponse, UpdateItemsRequest,
    UpdateStatusRequest,
};

use crate::auth::{AuthMiddleware, AuthenticatedUser};
use crate::detection::{DetectionError, DetectorAdapter};
use crate::error::ApiError;
use crate::lists::lifecycle::parse_status;
use crate::lists::{ListLifecycleManager, ListQuery, ListQueryParams, ListQueryService};
use crate::prediction::PredictionPipeline;

const IMAGE_FIELD: &str = "image";

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|e, _req: &HttpRequest| ApiError::BadRequest(e.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|e, _req: &HttpRequest| ApiError::BadRequest(e.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .wrap(auth_middleware)
            .service(web::resource("/process-image").route(web::post().to(process_image)))
            .service(
                web::resource("/shopping-lists")
                    .route(web::get().to(list_shopping_lists))
                    .route(web::post().to(create_shopping_list)),
            )
            .service(
                web::resource("/shopping-lists/{id}")
                    .route(web::patch().to(update_status))
                    .route(web::delete().to(delete_shopping_list)),
            )
            .service(
                web::resource("/shopping-lists/{id}/items")
                    .route(web::patch().to(update_items)),
            ),
    );
}

/// Reads the `image` field of a multipart upload, refusing to buffer more
/// than `max_bytes`.
async fn read_image_field(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = payload.try_next().await.map_err(invalid_multipart)? {
        if field.name() != Some(IMAGE_FIELD) {
            // Drain and ignore anything else.
            while let Some(chunk) = field.next().await {
                chunk.map_err(invalid_multipart)?;
            }
            continue;
        }

        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(invalid_multipart)?;
            if image_data.len() + data.len() > max_bytes {
                return Err(DetectionError::InvalidImage(format!(
                    "Image size should be at most {} bytes",
                    max_bytes
                ))
                .into());
            }
            image_data.extend_from_slice(&data);
        }
        return Ok(image_data);
    }
    Err(ApiError::BadRequest("No image file uploaded".to_string()))
}

fn invalid_multipart(e: actix_multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart payload: {}", e))
}

async fn process_image(
    user: AuthenticatedUser,
    payload: Multipart,
    detector: web::Data<DetectorAdapter>,
    pipeline: web::Data<PredictionPipeline>,
) -> Result<HttpResponse, ApiError> {
    let image_data = read_image_field(payload, detector.max_upload_bytes()).await?;
    info!(
        "Processing {} byte image for requester {}",
        image_data.len(),
        user.0
    );

    let detections = detector.detect(image_data).await?;
    let predictions = pipeline.run(&detections);
    info!(
        "Image for requester {} produced {} predictions",
        user.0,
        predictions.len()
    );

    Ok(HttpResponse::Ok().json(ProcessImageResponse {
        success: true,
        predictions,
    }))
}

async fn list_shopping_lists(
    user: AuthenticatedUser,
    params: web::Query<ListQueryParams>,
    query_service: web::Data<ListQueryService>,
) -> Result<HttpResponse, ApiError> {
    let query = ListQuery::try_from(params.into_inner())?;
    let lists = query_service.query(&user.0, query).await?;
    Ok(HttpResponse::Ok().json(lists))
}

async fn create_shopping_list(
    user: AuthenticatedUser,
    body: web::Json<CreateListRequest>,
    lists: web::Data<ListLifecycleManager>,
) -> Result<HttpResponse, ApiError> {
    let list = lists.create(&user.0, body.into_inner().items).await?;
    Ok(HttpResponse::Ok().json(list))
}

async fn update_status(
    user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
    lists: web::Data<ListLifecycleManager>,
) -> Result<HttpResponse, ApiError> {
    let status = parse_status(&body.status)?;
    let list = lists.set_status(&path.into_inner(), &user.0, status).await?;
    Ok(HttpResponse::Ok().json(list))
}

async fn update_items(
    user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<UpdateItemsRequest>,
    lists: web::Data<ListLifecycleManager>,
) -> Result<HttpResponse, ApiError> {
    let list = lists
        .update_items(&path.into_inner(), &user.0, body.into_inner().items)
        .await?;
    Ok(HttpResponse::Ok().json(list))
}

async fn delete_shopping_list(
    user: AuthenticatedUser,
    path: web::Path<String>,
    lists: web::Data<ListLifecycleManager>,
) -> Result<HttpResponse, ApiError> {
    lists.delete(&path.into_inner(), &user.0).await?;
    Ok(HttpResponse::Ok().json(DeleteResponse { success: true }))
}

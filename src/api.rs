// HTTP handlers for the object store
use actix_web::http::header;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use log::{debug, warn};
use log_mdc;

use crate::app_state::AppState;
use crate::error::StoreError;
use crate::object::{Entity, SaveAttributes};

/// Headers prefixed with this are persisted as object metadata.
const META_HEADER_PREFIX: &str = "x-meta-";

fn attributes_from_request(name: &str, req: &HttpRequest) -> SaveAttributes {
    let mut attributes = SaveAttributes {
        filename: Some(name.to_string()),
        ..Default::default()
    };

    if let Some(ct) = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
    {
        if !ct.is_empty() {
            attributes.content_type = Some(ct.to_string());
        }
    }

    for (header_name, header_value) in req.headers() {
        let key = header_name.as_str();
        if let Some(meta_key) = key.strip_prefix(META_HEADER_PREFIX) {
            if let Ok(value) = header_value.to_str() {
                attributes
                    .metadata
                    .insert(meta_key.to_string(), value.to_string());
            }
        }
    }

    attributes
}

/// Bridge the request payload onto a bounded channel so the store sees a
/// Send byte stream. The channel capacity is what carries backpressure from
/// the backend write stream back to the connection.
fn payload_entity(mut payload: web::Payload) -> Entity {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, StoreError>>(8);
    actix_web::rt::spawn(async move {
        while let Some(chunk) = payload.next().await {
            let item =
                chunk.map_err(|e| StoreError::backend(format!("payload read failed: {}", e)));
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    Entity::Stream(stream.boxed())
}

/// PUT /objects/{name}: store the request body as a new version.
pub async fn put_object(
    path: web::Path<String>,
    payload: web::Payload,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let name = path.into_inner();
    log_mdc::insert("object", &name);
    debug!("PUT object: name={}", name);

    let attributes = attributes_from_request(&name, &req);
    let entity = payload_entity(payload);

    let object = app_state.store.save(entity, attributes).await?;
    Ok(HttpResponse::Ok().json(object))
}

/// GET /objects/{name}: stream the current version back.
pub async fn get_object(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let name = path.into_inner();
    log_mdc::insert("object", &name);
    debug!("GET object: name={}", name);

    let stream = app_state.store.find_by_id(&name).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .streaming(
            stream.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        ))
}

/// GET /objects/{name}/versions: list the lineage, newest version first.
pub async fn list_versions(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let name = path.into_inner();
    debug!("GET versions: name={}", name);

    let lineage = app_state.store.find(&name).await?;
    Ok(HttpResponse::Ok().json(lineage))
}

/// DELETE /objects/{id}: delete one object by backend id.
pub async fn delete_object(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    debug!("DELETE object: id={}", id);

    let removed = app_state.store.remove_by_id(&id).await.map_err(|e| {
        warn!("Delete rejected for id {}: {}", id, e);
        e
    })?;
    Ok(HttpResponse::Ok().json(removed))
}

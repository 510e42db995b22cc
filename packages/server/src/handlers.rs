//! HTTP handler functions for the incident responder API.

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, web};
use base64::Engine as _;
use incident_responder_classifier::classify;
use incident_responder_dispatch::DispatchJob;
use incident_responder_dispatch::report::image_path;
use incident_responder_incident_models::{ImageAttachment, IncidentContext, IncidentForm};
use incident_responder_report::{
    generate_mindmap, markdown_file_name, pdf_file_name, read_report, render_pdf,
};
use incident_responder_server_models::{
    ApiError, ApiHealth, ApiImage, ChatRequest, ChatResponse, MindmapResponse, SessionResponse,
    StatusResponse, SubmitIncidentRequest, SubmitIncidentResponse, ValidationErrorResponse,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

fn error(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiError::new(message))
}

fn session_not_found(id: &str) -> HttpResponse {
    error(StatusCode::NOT_FOUND, format!("Unknown session '{id}'"))
}

fn report_not_available() -> HttpResponse {
    error(StatusCode::NOT_FOUND, "Report not available")
}

/// Reads the session's finished report.
///
/// Returns the error response to send if there is no session, no finished
/// report or the file cannot be read.
async fn load_report(
    state: &AppState,
    id: &str,
) -> Result<(std::path::PathBuf, String), HttpResponse> {
    let Some(session) = state.sessions.get(id) else {
        return Err(session_not_found(id));
    };

    let path = {
        let mut session = session.lock().await;
        session.drain_updates();
        session.report_path().map(std::path::Path::to_path_buf)
    };
    let Some(path) = path else {
        return Err(report_not_available());
    };

    match read_report(&path).await {
        Ok(markdown) => Ok((path, markdown)),
        Err(e) => {
            log::error!("Failed to read report {}: {e}", path.display());
            Err(report_not_available())
        }
    }
}

fn decode_image(image: Option<ApiImage>) -> Result<Option<ImageAttachment>, base64::DecodeError> {
    image
        .map(|image| {
            // Accept data URLs as produced by `FileReader.readAsDataURL`.
            let data = image
                .data
                .split_once("base64,")
                .map_or(image.data.as_str(), |(_, data)| data);
            base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map(|data| ImageAttachment {
                    mime_type: image.mime_type,
                    data,
                })
        })
        .transpose()
}

/// `GET /`
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/sessions`
pub async fn create_session(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Created().json(SessionResponse {
        session_id: state.sessions.create(),
    })
}

/// `POST /api/sessions/{id}/incidents`
///
/// Validates the form, classifies the incident and starts the background
/// dispatch. Blank required fields are rejected with `422` before any
/// model is called.
pub async fn submit_incident(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SubmitIncidentRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let request = body.into_inner();
    let image = match decode_image(request.image) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Rejected incident image for session {id}: {e}");
            return error(StatusCode::BAD_REQUEST, format!("Invalid image data: {e}"));
        }
    };

    let form = IncidentForm {
        name: request.name,
        description: request.description,
        location: request.location,
        image,
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(fields) => {
            return HttpResponse::UnprocessableEntity().json(ValidationErrorResponse {
                error: "Please fill in the required fields.".to_string(),
                fields,
            });
        }
    };

    let (category, severity) =
        classify(state.provider.as_ref(), &valid.description, valid.image.as_ref()).await;

    log::info!("Classified incident for session {id} as {category}/{severity}");

    let context = IncidentContext::new(&valid, category, severity);
    let saved_image = valid
        .image
        .as_ref()
        .map(|image| image_path(state.dispatcher.output_dir(), &context, image));
    let updates = state.dispatcher.spawn(DispatchJob {
        context: context.clone(),
        image: valid.image,
    });

    let incident_id = context.id.clone();
    let status = {
        let mut session = session.lock().await;
        session.start_dispatch(context, saved_image, updates);
        session.status().clone()
    };

    HttpResponse::Accepted().json(SubmitIncidentResponse {
        incident_id,
        category,
        severity,
        status,
    })
}

/// `GET /api/sessions/{id}/status`
pub async fn status(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let mut session = session.lock().await;
    session.drain_updates();

    HttpResponse::Ok().json(StatusResponse {
        status: session.status().clone(),
        progress: session.progress().to_vec(),
        incident: session.context.clone(),
    })
}

/// `GET /api/sessions/{id}/report`
///
/// The report markdown, served verbatim.
pub async fn report(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match load_report(&state, &path.into_inner()).await {
        Ok((path, markdown)) => HttpResponse::Ok()
            .content_type("text/markdown; charset=utf-8")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", markdown_file_name(&path)),
            ))
            .body(markdown),
        Err(response) => response,
    }
}

/// `GET /api/sessions/{id}/report.pdf`
///
/// PDF export is best effort: failures are logged and reported as `404`.
pub async fn report_pdf(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let (path, markdown) = match load_report(&state, &path.into_inner()).await {
        Ok(report) => report,
        Err(response) => return response,
    };

    match render_pdf("Incident Report", &markdown) {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf_file_name(&path)),
            ))
            .body(bytes),
        Err(e) => {
            log::warn!("PDF export of {} failed: {e}", path.display());
            error(StatusCode::NOT_FOUND, "PDF export unavailable")
        }
    }
}

/// `GET /api/sessions/{id}/images/{file}`
///
/// Serves the current incident's uploaded image. The report links it as
/// `images/<file>`, so the UI resolves that link against the session URL.
/// Only the session's own image is served.
pub async fn image(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (id, file) = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let image = session
        .lock()
        .await
        .image_path()
        .filter(|path| path.file_name().is_some_and(|name| name == file.as_str()))
        .map(std::path::Path::to_path_buf);
    let Some(image) = image else {
        return error(StatusCode::NOT_FOUND, "Image not available");
    };

    match tokio::fs::read(&image).await {
        Ok(bytes) => {
            let content_type = if image.extension().is_some_and(|ext| ext == "png") {
                "image/png"
            } else {
                "image/jpeg"
            };
            HttpResponse::Ok().content_type(content_type).body(bytes)
        }
        Err(e) => {
            log::warn!("Failed to read image {}: {e}", image.display());
            error(StatusCode::NOT_FOUND, "Image not available")
        }
    }
}

/// `GET /api/sessions/{id}/mindmap`
pub async fn mindmap(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let (path, markdown) = match load_report(&state, &path.into_inner()).await {
        Ok(report) => report,
        Err(response) => return response,
    };

    match generate_mindmap(state.provider.as_ref(), &markdown).await {
        Ok(mindmap) => HttpResponse::Ok().json(MindmapResponse::from(mindmap)),
        Err(e) => {
            log::error!("Mindmap generation for {} failed: {e}", path.display());
            error(StatusCode::BAD_GATEWAY, format!("Mindmap generation failed: {e}"))
        }
    }
}

/// `GET /api/sessions/{id}/chat`
pub async fn chat_history(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let session = session.lock().await;
    HttpResponse::Ok().json(ChatResponse {
        reply: None,
        entries: session.chat.entries().to_vec(),
    })
}

/// `POST /api/sessions/{id}/chat`
pub async fn chat(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ChatRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let message = body.message.trim();
    if message.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    let mut session = session.lock().await;
    let reply = session.chat.send(state.provider.as_ref(), message).await;

    HttpResponse::Ok().json(ChatResponse {
        reply: Some(reply),
        entries: session.chat.entries().to_vec(),
    })
}

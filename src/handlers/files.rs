use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::{
    answers::{attachment_views, AttachmentView},
    Endpoints,
};
use crate::{
    db::models::{AnswerKey, FileUpload},
    envelope,
    extractors::Payload,
    models::AnswerFileQuery,
    names,
    rejections::{AppError, Required, ResultExt},
    storage::{self, UploadRejection},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(
            names::UPLOAD_FILE,
            post(upload_answer_file).layer(DefaultBodyLimit::max(names::UPLOAD_BODY_LIMIT)),
        )
        .endpoint(names::DOWNLOAD_FILE, get(download_answer_file))
        .endpoint(
            names::DELETE_FILE,
            post(delete_answer_file).delete(delete_answer_file),
        )
}

impl From<UploadRejection> for AppError {
    fn from(rejection: UploadRejection) -> Self {
        match rejection {
            UploadRejection::Extension => AppError::UnsupportedMediaType("File type not permitted"),
            UploadRejection::TooLarge => AppError::PayloadTooLarge("File too large (max 15 MB)"),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large (max 15 MB)")
    } else {
        tracing::debug!("rejected multipart body: {e}");
        AppError::Input("File upload failed")
    }
}

#[derive(Default)]
struct UploadForm {
    activity_id: Option<i64>,
    student_id: Option<i64>,
    question_id: Option<i64>,
    file: Option<(String, axum::body::Bytes)>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((file_name, bytes));
            }
            "activityId" | "studentId" | "questionId" => {
                let text = field.text().await.map_err(multipart_error)?;
                if text.trim().is_empty() {
                    continue;
                }
                let id = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::Invalid(format!("Invalid {name}")))?;
                match name.as_str() {
                    "activityId" => form.activity_id = Some(id),
                    "studentId" => form.student_id = Some(id),
                    _ => form.question_id = Some(id),
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Uploaded {
    message: &'static str,
    file: AttachmentView,
    file_uploads: Vec<AttachmentView>,
}

/// Validation happens before anything touches the disk: required fields,
/// the question's upload permission, extension, then size.
async fn upload_answer_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;

    let mut required = Required::new();
    let activity_id = required.id("activityId", form.activity_id);
    let student_id = required.id("studentId", form.student_id);
    let question_id = required.id("questionId", form.question_id);
    let (original_name, bytes) = required.value("file", form.file);
    required.check()?;

    let permitted = state
        .db
        .find_question(question_id)
        .await
        .reject("could not load question")?
        .is_some_and(|q| q.upload_permitted);
    if !permitted {
        return Err(AppError::Forbidden(
            "Uploads are not permitted for this question",
        ));
    }

    let ext = storage::check_upload(&original_name, bytes.len() as u64)?;

    state
        .db
        .find_activity(activity_id, student_id)
        .await
        .reject("could not load activity")?
        .ok_or(AppError::NotFound("Activity not found"))?;

    let staged = state
        .store
        .stage(student_id, &ext, &bytes)
        .await
        .reject("Failed to save uploaded file")?;

    let entry = FileUpload {
        id: staged.id.clone(),
        original_name,
        mime_type: storage::mime_type(&bytes, &ext),
        size: bytes.len() as u64,
        uploaded_at: chrono::Local::now().to_rfc3339(),
        path: staged.relative.clone(),
    };
    let key = AnswerKey {
        activity_id,
        student_id,
        question_id,
    };

    let files = match state.db.attach_file(key, &entry, || staged.place()).await {
        Ok(files) => files,
        Err(e) => {
            staged.discard().await;
            tracing::error!("Failed to save uploaded file: {e}");
            return Err(AppError::Internal("Failed to save uploaded file"));
        }
    };

    let file = AttachmentView {
        url: names::download_url(
            state.config.api_base(),
            activity_id,
            student_id,
            question_id,
            &entry.id,
        ),
        file: entry,
    };

    Ok(envelope::ok(Uploaded {
        message: "File uploaded",
        file,
        file_uploads: attachment_views(&state, activity_id, student_id, question_id, files),
    }))
}

struct FileRequest {
    key: AnswerKey,
    file_id: String,
}

fn file_request(query: AnswerFileQuery) -> Result<FileRequest, AppError> {
    let mut required = Required::new();
    let activity_id = required.id("activityId", query.activity_id);
    let student_id = required.id("studentId", query.student_id);
    let question_id = required.id("questionId", query.question_id);
    let file_id = required.text("fileId", query.file_id);
    required.check()?;

    Ok(FileRequest {
        key: AnswerKey {
            activity_id,
            student_id,
            question_id,
        },
        file_id,
    })
}

/// Keeps a client file name safe for a quoted header parameter.
fn disposition_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    base.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}

async fn download_answer_file(
    State(state): State<AppState>,
    Payload(query): Payload<AnswerFileQuery>,
) -> Result<Response, AppError> {
    let request = file_request(query)?;

    let files = state
        .db
        .attachments(request.key)
        .await
        .reject("could not load attachments")?
        .ok_or(AppError::NotFound("Answer record not found"))?;

    let entry = files
        .into_iter()
        .find(|f| f.id == request.file_id)
        .ok_or(AppError::NotFound("File not found for this answer"))?;

    let path = state
        .store
        .resolve(&entry.path)
        .ok_or(AppError::NotFound("Stored file missing"))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("attachment {} missing at {}", entry.id, path.display());
            return Err(AppError::NotFound("Stored file missing"));
        }
        Err(e) => {
            tracing::error!("could not read {}: {e}", path.display());
            return Err(AppError::Internal("could not read stored file"));
        }
    };

    let headers = [
        (header::CONTENT_TYPE, entry.mime_type),
        (header::CONTENT_LENGTH, bytes.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename=\"{}\"",
                disposition_name(&entry.original_name)
            ),
        ),
    ];

    Ok((headers, bytes).into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Removed {
    message: &'static str,
    file_uploads: Vec<AttachmentView>,
}

async fn delete_answer_file(
    State(state): State<AppState>,
    Payload(query): Payload<AnswerFileQuery>,
) -> Result<Response, AppError> {
    let request = file_request(query)?;
    let key = request.key;

    let (removed, remaining) = state
        .db
        .detach_file(key, &request.file_id)
        .await
        .reject("could not remove attachment")?
        .ok_or(AppError::NotFound("File not found for this answer"))?;

    state.store.remove(&removed.path).await;

    Ok(envelope::ok(Removed {
        message: "File removed",
        file_uploads: attachment_views(
            &state,
            key.activity_id,
            key.student_id,
            key.question_id,
            remaining,
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_name_strips_paths_and_quotes() {
        assert_eq!(disposition_name("essay.pdf"), "essay.pdf");
        assert_eq!(disposition_name("C:\\Users\\me\\my \"best\".docx"), "my best.docx");
        assert_eq!(disposition_name("../../etc/passwd"), "passwd");
    }

    #[test]
    fn upload_rejections_map_to_status_codes() {
        assert_eq!(
            AppError::from(UploadRejection::Extension).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            AppError::from(UploadRejection::TooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}

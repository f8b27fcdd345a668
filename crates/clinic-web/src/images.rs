//! 医学影像上传与检索接口

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use chrono::Utc;
use clinic_core::utils::image_file_name;
use clinic_core::{ClinicError, MedicalImage, User};
use clinic_database::{DatabaseQueries, NewImage};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::handlers::ApiResult;
use crate::permissions::{self, allow};
use crate::server::AppState;

/// 影像上传（医生或管理员）
///
/// multipart表单字段：patient_id、image_type、description（可选）、file。
/// 文件先写入存储再落库：中断最多留下孤儿文件，不会产生指向缺失
/// 文件的记录。
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::MANAGE_IMAGES)?;

    let mut patient_id: Option<Uuid> = None;
    let mut image_type: Option<String> = None;
    let mut description: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ClinicError::Validation(e.to_string()))?
    {
        let field_name = field.name().map(|name| name.to_string());
        match field_name.as_deref() {
            Some("patient_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ClinicError::Validation(e.to_string()))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| ClinicError::Validation("Invalid patient_id".to_string()))?;
                patient_id = Some(id);
            }
            Some("image_type") => {
                image_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ClinicError::Validation(e.to_string()))?,
                );
            }
            Some("description") => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ClinicError::Validation(e.to_string()))?,
                );
            }
            Some("file") => {
                file_name = field.file_name().map(|name| name.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ClinicError::Validation(e.to_string()))?;
                file_data = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let patient_id =
        patient_id.ok_or_else(|| ClinicError::Validation("Missing patient_id".to_string()))?;
    let image_type =
        image_type.ok_or_else(|| ClinicError::Validation("Missing image_type".to_string()))?;
    let file_data =
        file_data.ok_or_else(|| ClinicError::Validation("Missing file".to_string()))?;
    let file_name = file_name.unwrap_or_else(|| "upload.bin".to_string());

    let queries = DatabaseQueries::new(&state.db);
    queries
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Patient not found".to_string()))?;

    // 先落盘，后写库
    let relative_path = image_file_name(patient_id, &file_name, Utc::now());
    state.storage.store_file(&file_data, &relative_path).await?;

    let image_id = queries
        .create_image(&NewImage {
            patient_id,
            uploaded_by: current_user.id,
            image_path: relative_path.clone(),
            image_type,
            description,
        })
        .await?;

    info!("Uploaded image {} for patient {}", image_id, patient_id);
    Ok(Json(json!({"id": image_id, "image_path": relative_path})))
}

/// 影像下载
///
/// 记录不存在与记录存在但文件缺失都返回404，后者不会被当作成功。
pub async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Response> {
    let queries = DatabaseQueries::new(&state.db);
    let image = queries
        .get_image_row(image_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Image not found".to_string()))?;

    if !state.storage.exists(&image.image_path).await {
        return Err(ClinicError::NotFound("Image file not found".to_string()).into());
    }

    let data = state.storage.get_file(&image.image_path).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| ClinicError::Internal(e.to_string()))?;

    Ok(response)
}

/// 获取患者的全部影像记录
pub async fn list_patient_images(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MedicalImage>>> {
    let queries = DatabaseQueries::new(&state.db);
    Ok(Json(queries.list_patient_images(patient_id).await?))
}

/// 删除影像（医生或管理员）：先删文件（若存在），再删记录
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(current_user): Extension<User>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    permissions::require_role(&current_user, allow::MANAGE_IMAGES)?;

    let queries = DatabaseQueries::new(&state.db);
    let image = queries
        .get_image_row(image_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Image not found".to_string()))?;

    if state.storage.exists(&image.image_path).await {
        state.storage.delete_file(&image.image_path).await?;
    }

    queries.delete_image(image_id).await?;

    info!("Deleted image {}", image_id);
    Ok(Json(json!({"message": "Image deleted successfully"})))
}

use axum::Json;

use super::{ApiResponse, OptionDto};
use crate::models::{Capital, UserRole};

/// GET /capitals-for-select
pub async fn capitals_for_select() -> Json<ApiResponse<Vec<OptionDto>>> {
    let options = Capital::ALL
        .into_iter()
        .map(|capital| OptionDto {
            value: capital.value().to_string(),
            label: capital.label().to_string(),
        })
        .collect();

    Json(ApiResponse::success(options))
}

/// GET /permissions-for-select
pub async fn permissions_for_select() -> Json<ApiResponse<Vec<OptionDto>>> {
    let options = UserRole::ALL
        .into_iter()
        .map(|role| OptionDto {
            value: role.value().to_string(),
            label: role.label().to_string(),
        })
        .collect();

    Json(ApiResponse::success(options))
}

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::{RequireAdmin, gate};
use crate::catalog::Choice;
use crate::server::AppState;
use crate::server::dto::{ChangeRolePage, ChangeRoleRequest, RoleChoice};
use crate::server::response::{ApiError, ApiResponse, Notice, StoreResultExt};
use crate::store::query::user;
use crate::store::{Order, Record, StoreExt};
use crate::types::{Role, User};

pub async fn change_role_page(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let users = state
        .store
        .get_all::<User>(&User::query().order_by(user::NAME, Order::Asc))
        .api_err("Failed to list users")?
        .into_iter()
        .map(|u| Choice {
            id: u.id,
            label: format!("{} | {} | {}", u.role.as_str(), u.name, u.email),
        })
        .collect();

    let roles = Role::ALL
        .into_iter()
        .map(|role| RoleChoice {
            role,
            label: role.label(),
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(ChangeRolePage { users, roles })))
}

pub async fn change_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state
        .store
        .get_one_or_none::<User>(&User::query().eq(user::ID, req.user))
        .api_err("Failed to get user")?
        .ok_or_else(|| ApiError::field("user", "User not found"))?;

    gate::check_role_change(state.role_policy, &admin, &target, req.role)?;

    let diff = state
        .store
        .update_user_role(&admin, target.id, req.role)
        .or_flash("/admin/change_role")?;

    tracing::info!(
        "User {} changed the role of user {} from {} to {}",
        admin.id,
        target.id,
        target.role,
        req.role
    );

    Ok(Json(
        ApiResponse::success(diff).notice(Notice::success("User role changed")),
    ))
}

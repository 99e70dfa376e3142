use crate::errors::ServiceError;
use crate::models::Order;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/orders/:order_id", get(get_order))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.orders.get_order(&order_id).await?))
}

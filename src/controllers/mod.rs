pub mod analytics;
pub mod auth;
pub mod bookings;
pub mod bookmarks;
pub mod festival;
pub mod genres;
pub mod movies;
pub mod news;
pub mod payments;
pub mod promotions;
pub mod showtimes;
pub mod ticket_prices;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(movies::routes())
        .merge(genres::routes())
        .merge(showtimes::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(news::routes())
        .merge(promotions::routes())
        .merge(festival::routes())
        .merge(ticket_prices::routes())
        .merge(bookmarks::routes())
        .merge(analytics::routes())
}

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::middleware::AdminUser;
use crate::models::{movie::MOVIE_TYPES, Movie};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
}

#[derive(Debug, Deserialize)]
pub struct MoviesQuery {
    pub query: Option<String>,
    pub genre_id: Option<i64>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

// GET /api/movies
//
// Без фильтров отдаем коллекцию из кеша каталога; с фильтрами идем
// через SearchClient и кешируем результат по ключу запроса.
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MoviesQuery>,
) -> Response {
    let query_val = params.query.as_deref().unwrap_or_default();
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 50) as usize;

    if query_val.is_empty() && params.genre_id.is_none() {
        // Коллекция целиком живет в кеше, страницу режем в памяти
        let movies = state.cache.get_movies().await;
        let total = movies.len();
        let offset = (page as usize - 1) * page_size;
        let page_items: Vec<&Movie> = movies.iter().skip(offset).take(page_size).collect();

        return Json(json!({
            "success": true,
            "movies": page_items,
            "count": total
        }))
        .into_response();
    }

    // 1. Уникальный ключ кеша на основе параметров запроса
    let cache_key = format!(
        "search:movies:q={}&g={}&p={}&ps={}",
        query_val,
        params.genre_id.unwrap_or(0),
        page,
        page_size
    );

    // 2. Пытаемся получить результат из кеша
    if let Ok(Some(cached_json)) = state.cache.get_cached_search(&cache_key).await {
        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached_json))
            .unwrap();
    }

    // 3. Cache Miss: идем в базу данных
    let limit = page_size as i64;
    let offset = ((page - 1) as i64) * limit;

    let search_result = state
        .search_client
        .search_movies(query_val, params.genre_id, limit, offset)
        .await;

    let response_json = match search_result {
        Ok(movies) => {
            let count = movies.len();
            json!({
                "success": true,
                "movies": movies,
                "count": count
            })
        }
        Err(e) => {
            tracing::error!("Failed to search movies: {:?}", e);
            return Json(json!({
                "success": false,
                "error": "Failed to retrieve movies"
            }))
            .into_response();
        }
    };

    // 4. Сериализуем и сохраняем результат в кеш
    if let Ok(json_str) = serde_json::to_string(&response_json) {
        if let Err(e) = state.cache.cache_search_result(&cache_key, &json_str, 3600).await {
            tracing::error!("Failed to cache search result: {:?}", e);
        }

        return Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "MISS")
            .body(Body::from(json_str))
            .unwrap();
    }

    // Fallback в случае ошибки сериализации
    Json(response_json).into_response()
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let movie = sqlx::query_as::<_, Movie>(
        "SELECT id, title, description, author, image, trailer, movie_type,
                duration_minutes, release_date, genre_id, created_at, updated_at
         FROM movies WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_movie sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Ошибка БД".to_string())
    })?;

    match movie {
        Some(movie) => Ok((StatusCode::OK, Json(movie))),
        None => Err((StatusCode::NOT_FOUND, "Фильм не найден".to_string())),
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateMovieRequest {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    trailer: String,
    #[serde(rename = "type")]
    movie_type: String,
    #[validate(range(min = 1, max = 600))]
    duration_minutes: i32,
    release_date: NaiveDate,
    genre_id: i64,
}

// POST /api/movies - только админ
async fn create_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if !MOVIE_TYPES.contains(&req.movie_type.as_str()) {
        return Err((StatusCode::BAD_REQUEST, "Формат фильма должен быть 2D или 3D".to_string()));
    }

    let genre_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM genres WHERE id = $1)")
        .bind(req.genre_id)
        .fetch_one(&state.db.pool)
        .await
        .unwrap_or(false);
    if !genre_exists {
        return Err((StatusCode::BAD_REQUEST, "Жанр не найден".to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO movies (title, description, author, image, trailer, movie_type,
                            duration_minutes, release_date, genre_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.author)
    .bind(&req.image)
    .bind(&req.trailer)
    .bind(&req.movie_type)
    .bind(req.duration_minutes)
    .bind(req.release_date)
    .bind(req.genre_id)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_movie sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось создать фильм".to_string())
    })?;

    state.cache.invalidate_movies().await;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

#[derive(Debug, Deserialize)]
struct UpdateMovieRequest {
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    image: Option<String>,
    trailer: Option<String>,
    #[serde(rename = "type")]
    movie_type: Option<String>,
    duration_minutes: Option<i32>,
    release_date: Option<NaiveDate>,
    genre_id: Option<i64>,
}

// PATCH /api/movies/{id} - только админ
async fn update_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMovieRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(ref mt) = req.movie_type {
        if !MOVIE_TYPES.contains(&mt.as_str()) {
            return Err((StatusCode::BAD_REQUEST, "Формат фильма должен быть 2D или 3D".to_string()));
        }
    }
    if let Some(d) = req.duration_minutes {
        if d <= 0 {
            return Err((StatusCode::BAD_REQUEST, "Длительность должна быть > 0".to_string()));
        }
    }
    if let Some(g) = req.genre_id {
        let genre_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM genres WHERE id = $1)")
            .bind(g)
            .fetch_one(&state.db.pool)
            .await
            .unwrap_or(false);
        if !genre_exists {
            return Err((StatusCode::BAD_REQUEST, "Жанр не найден".to_string()));
        }
    }

    let updated = sqlx::query(
        r#"
        UPDATE movies
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            author = COALESCE($4, author),
            image = COALESCE($5, image),
            trailer = COALESCE($6, trailer),
            movie_type = COALESCE($7, movie_type),
            duration_minutes = COALESCE($8, duration_minutes),
            release_date = COALESCE($9, release_date),
            genre_id = COALESCE($10, genre_id),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.author)
    .bind(req.image)
    .bind(req.trailer)
    .bind(req.movie_type)
    .bind(req.duration_minutes)
    .bind(req.release_date)
    .bind(req.genre_id)
    .execute(&state.db.pool)
    .await
    .map(|r| r.rows_affected() > 0)
    .map_err(|e| {
        tracing::error!("update_movie sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось обновить фильм".to_string())
    })?;

    if !updated {
        return Err((StatusCode::NOT_FOUND, "Фильм не найден".to_string()));
    }

    state.cache.invalidate_movies().await;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

// DELETE /api/movies/{id} - только админ
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // У фильма с бронированиями сеансы удалять нельзя
    let has_bookings = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
          SELECT 1 FROM bookings b
          JOIN showtimes st ON st.id = b.showtime_id
          WHERE st.movie_id = $1
        )
        "#,
    )
    .bind(id)
    .fetch_one(&state.db.pool)
    .await
    .unwrap_or(false);

    if has_bookings {
        return Err((StatusCode::CONFLICT, "Нельзя удалить фильм с бронированиями".to_string()));
    }

    let deleted = sqlx::query("DELETE FROM movies WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await
        .map(|r| r.rows_affected() > 0)
        .map_err(|e| {
            tracing::error!("delete_movie sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Не удалось удалить фильм".to_string())
        })?;

    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Фильм не найден".to_string()));
    }

    state.cache.invalidate_movies().await;
    state.cache.invalidate_showtimes().await;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

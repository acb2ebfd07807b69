use sqlx::PgPool;
use tracing::info;

use crate::models::Movie;

/// Клиент поиска по каталогу фильмов
#[derive(Clone)]
pub struct SearchClient {
    pool: PgPool,
}

impl SearchClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        info!("Search client initialized");
        Ok(())
    }

    pub async fn search_movies(
        &self,
        query: &str,
        genre_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        if query.is_empty() && genre_id.is_none() {
            // Быстрый путь для пустых запросов
            self.fast_path_empty_query(limit, offset).await
        } else {
            // Поиск по подстроке названия (автоподсказка админки)
            self.title_search(query, genre_id, limit, offset).await
        }
    }

    /// Быстрый путь: свежие релизы без фильтров
    async fn fast_path_empty_query(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, title, description, author, image, trailer, movie_type,
                   duration_minutes, release_date, genre_id, created_at, updated_at
            FROM movies
            ORDER BY release_date DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Регистронезависимый поиск по названию с опциональным жанром
    async fn title_search(
        &self,
        query: &str,
        genre_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        let pattern = format!("%{}%", Self::prepare_search_query(query));

        let mut q = String::from(
            "SELECT id, title, description, author, image, trailer, movie_type,
                    duration_minutes, release_date, genre_id, created_at, updated_at
             FROM movies
             WHERE title ILIKE $1",
        );
        let mut bind_idx = 2;
        if genre_id.is_some() {
            q.push_str(&format!(" AND genre_id = ${}", bind_idx));
            bind_idx += 1;
        }
        q.push_str(&format!(
            " ORDER BY release_date DESC, id LIMIT ${} OFFSET ${}",
            bind_idx,
            bind_idx + 1
        ));

        let mut dbq = sqlx::query_as::<_, Movie>(&q).bind(pattern);
        if let Some(g) = genre_id {
            dbq = dbq.bind(g);
        }

        dbq.bind(limit).bind(offset).fetch_all(&self.pool).await
    }

    /// Оставляем только буквы, цифры, пробелы и дефис - заодно
    /// выбрасывает метасимволы ILIKE ('%', '_')
    fn prepare_search_query(query: &str) -> String {
        query
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_like_metacharacters() {
        assert_eq!(SearchClient::prepare_search_query("spider%_man"), "spiderman");
        assert_eq!(SearchClient::prepare_search_query("  inside   out "), "inside out");
        assert_eq!(SearchClient::prepare_search_query("re-run"), "re-run");
        assert_eq!(SearchClient::prepare_search_query("'; DROP TABLE--"), "DROP TABLE--");
    }
}

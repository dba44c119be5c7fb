//! services/api/src/adapters/content.rs
//!
//! Postgres-backed implementation of the `ContentSource` port: read-only,
//! side-effect-free queries over the site's content tables, normalized into
//! the records the remote indexer expects.

use async_trait::async_trait;
use sitechat_core::domain::{ContentRecord, PageSummary, ProductRecord};
use sitechat_core::ports::{ContentSource, RelayError, RelayResult};
use sitechat_core::text::{strip_markup, trim_words, CONTENT_WORD_LIMIT};
use sqlx::{FromRow, PgPool};

/// The tag an editor attaches to a post to opt it into chatbot indexing.
const INDEX_TAG: &str = "ai-chatbot-content";

/// Per-category extraction ceiling, matching the remote indexer's appetite.
const EXTRACT_LIMIT: i64 = 100;

/// Slugs tried when the admin has not curated an explicit policy-page list.
/// The explicit list, when present, always wins.
const POLICY_SLUGS: [&str; 10] = [
    "privacy-policy",
    "terms-of-service",
    "terms-and-conditions",
    "terms-conditions",
    "terms-conditions-of-service",
    "cookie-policy",
    "data-protection-policy",
    "disclaimer",
    "refund-policy",
    "shipping-policy",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A content adapter that implements the `ContentSource` port.
#[derive(Clone)]
pub struct PgContentSource {
    pool: PgPool,
    commerce_enabled: bool,
}

impl PgContentSource {
    /// Creates a new `PgContentSource`.
    pub fn new(pool: PgPool, commerce_enabled: bool) -> Self {
        Self {
            pool,
            commerce_enabled,
        }
    }

    fn store_err(error: sqlx::Error) -> RelayError {
        RelayError::Store(error.to_string())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ContentItemRecord {
    id: i64,
    kind: String,
    title: String,
    body: String,
    url: String,
}

impl ContentItemRecord {
    /// Normalizes a stored item: markup stripped, optionally word-limited.
    fn to_domain(self, word_limit: Option<usize>) -> ContentRecord {
        let text = strip_markup(&self.body);
        let content = match word_limit {
            Some(limit) => trim_words(&text, limit),
            None => text,
        };
        ContentRecord {
            id: self.id,
            kind: self.kind,
            title: self.title,
            content,
            url: self.url,
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    short_description: String,
    price: String,
    sku: String,
    attributes: String,
    dimensions: String,
    url: String,
    image_url: String,
    images_gallery: Vec<String>,
}

impl ProductRow {
    fn to_domain(self) -> ProductRecord {
        ProductRecord {
            id: self.id,
            title: self.name,
            description: strip_markup(&self.description),
            short_description: strip_markup(&self.short_description),
            price: self.price,
            sku: self.sku,
            attributes: self.attributes,
            dimensions: self.dimensions,
            url: self.url,
            image_url: self.image_url,
            images_gallery: self.images_gallery,
        }
    }
}

#[derive(FromRow)]
struct PageHit {
    id: i64,
    title: String,
}

//=========================================================================================
// `ContentSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentSource for PgContentSource {
    async fn faqs(&self) -> RelayResult<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentItemRecord>(
            "SELECT id, kind, title, body, url FROM content_items
             WHERE kind = 'faq' AND published
             ORDER BY id
             LIMIT $1",
        )
        .bind(EXTRACT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(|r| r.to_domain(None)).collect())
    }

    async fn pages(&self) -> RelayResult<Vec<ContentRecord>> {
        // Policy-looking pages are excluded here; they travel in the
        // dedicated policies category instead.
        let rows = sqlx::query_as::<_, ContentItemRecord>(
            "SELECT id, kind, title, body, url FROM content_items
             WHERE kind = 'page' AND published
               AND title NOT ILIKE '%policy%'
               AND body NOT ILIKE '%privacy policy%'
             ORDER BY id
             LIMIT $1",
        )
        .bind(EXTRACT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(|r| r.to_domain(None)).collect())
    }

    async fn tagged_posts(&self) -> RelayResult<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentItemRecord>(
            "SELECT id, kind, title, body, url FROM content_items
             WHERE kind = 'post' AND published AND $1 = ANY(tags)
             ORDER BY id
             LIMIT $2",
        )
        .bind(INDEX_TAG)
        .bind(EXTRACT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| r.to_domain(Some(CONTENT_WORD_LIMIT)))
            .collect())
    }

    async fn policy_pages(&self, selected_ids: &[i64]) -> RelayResult<Vec<ContentRecord>> {
        let rows = if selected_ids.is_empty() {
            // Zero-configuration fallback: well-known policy slugs.
            let slugs: Vec<String> = POLICY_SLUGS.iter().map(|s| s.to_string()).collect();
            sqlx::query_as::<_, ContentItemRecord>(
                "SELECT id, kind, title, body, url FROM content_items
                 WHERE kind = 'page' AND published AND slug = ANY($1)
                 ORDER BY id
                 LIMIT $2",
            )
            .bind(slugs)
            .bind(EXTRACT_LIMIT)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, ContentItemRecord>(
                "SELECT id, kind, title, body, url FROM content_items
                 WHERE kind = 'page' AND published AND id = ANY($1)
                 ORDER BY id
                 LIMIT $2",
            )
            .bind(selected_ids.to_vec())
            .bind(EXTRACT_LIMIT)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(Self::store_err)?;

        Ok(rows
            .into_iter()
            .map(|r| r.to_domain(Some(CONTENT_WORD_LIMIT)))
            .collect())
    }

    async fn products(&self) -> RelayResult<Vec<ProductRecord>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, short_description, price, sku, attributes,
                    dimensions, url, image_url, images_gallery
             FROM products
             WHERE published
             ORDER BY id
             LIMIT $1",
        )
        .bind(EXTRACT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(rows.into_iter().map(ProductRow::to_domain).collect())
    }

    fn commerce_active(&self) -> bool {
        self.commerce_enabled
    }

    async fn search_pages(&self, term: &str) -> RelayResult<Vec<PageSummary>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, PageHit>(
            "SELECT id, title FROM content_items
             WHERE kind = 'page' AND published AND title ILIKE '%' || $1 || '%'
             ORDER BY title
             LIMIT 10",
        )
        .bind(term.trim())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(rows
            .into_iter()
            .map(|hit| PageSummary {
                id: hit.id,
                title: hit.title,
            })
            .collect())
    }
}

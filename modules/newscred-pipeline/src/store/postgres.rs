use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use inference_client::truncate_to_char_boundary;
use newscred_common::{trim_stored, ClaimRecord, CompanySentiment, Entity, WorkItem};

use super::{ArticleStore, StoreHealth};

/// `entity_text` and `mention_text` are capped at this many bytes.
const MAX_MENTION_BYTES: usize = 255;

/// Postgres-backed store. Reads and translation writes are single statements;
/// one article's claims are written in one transaction.
///
/// Length predicates trim with `btrim(x, E' \t\n\r\f')`, the same set
/// `newscred_common::trim_stored` strips, and `LENGTH` counts characters.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_work_item((article_id, text, translation): (i64, String, Option<String>)) -> WorkItem {
    let item = WorkItem::new(article_id, text);
    match translation {
        Some(t) if !trim_stored(&t).is_empty() => item.with_translation(t),
        _ => item,
    }
}

fn bind_len(chars: usize) -> i32 {
    i32::try_from(chars).unwrap_or(i32::MAX)
}

async fn upsert_claim(conn: &mut PgConnection, claim: &ClaimRecord) -> Result<i64> {
    let (id,) = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO claims (article_id, claim, claim_hash, entities, updated_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (claim_hash) DO UPDATE
          SET entities = EXCLUDED.entities, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(claim.article_id)
    .bind(&claim.text)
    .bind(claim.hash.as_slice())
    .bind(claim.entities_json())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn upsert_entities(
    conn: &mut PgConnection,
    claim_id: i64,
    entities: &[Entity],
) -> Result<u64> {
    let mut affected = 0;
    for entity in entities {
        let result = sqlx::query(
            r#"
            INSERT INTO entities
              (claim_id, entity_type, entity_text, start_char, end_char, confidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (claim_id, entity_type, start_char, end_char) DO UPDATE
              SET entity_text = EXCLUDED.entity_text, confidence = EXCLUDED.confidence
            "#,
        )
        .bind(claim_id)
        .bind(entity.entity_type.as_str())
        .bind(truncate_to_char_boundary(&entity.text, MAX_MENTION_BYTES))
        .bind(bind_len(entity.start))
        .bind(bind_len(entity.end))
        .bind(entity.score)
        .execute(&mut *conn)
        .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

async fn upsert_company_sentiment(
    conn: &mut PgConnection,
    claim_id: i64,
    sentiment: &CompanySentiment,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO company_sentiment (claim_id, company_id, sentiment_label, mention_text)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (claim_id, company_id) DO UPDATE
          SET sentiment_label = EXCLUDED.sentiment_label
        "#,
    )
    .bind(claim_id)
    .bind(sentiment.company_id)
    .bind(sentiment.sentiment.as_str())
    .bind(truncate_to_char_boundary(&sentiment.mention, MAX_MENTION_BYTES))
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn pending_translations(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            r#"
            SELECT t.article_id, t.text, t.text_en
            FROM article_texts t
            JOIN articles a ON a.id = t.article_id
            WHERE a.status = 0
              AND t.text IS NOT NULL
              AND LENGTH(btrim(t.text, E' \t\n\r\f')) >= GREATEST($2, 1)
              AND (t.text_en IS NULL OR btrim(t.text_en, E' \t\n\r\f') = '')
            ORDER BY t.article_id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(bind_len(min_chars))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(to_work_item).collect())
    }

    async fn pending_extractions(&self, limit: i64, min_chars: usize) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            r#"
            SELECT a.id, t.text, t.text_en
            FROM article_texts t
            JOIN articles a ON a.id = t.article_id
            WHERE a.status = 0
              AND t.text IS NOT NULL
              AND LENGTH(btrim(
                    COALESCE(NULLIF(btrim(t.text_en, E' \t\n\r\f'), ''), t.text),
                    E' \t\n\r\f'
                  )) > $2
              AND NOT EXISTS (SELECT 1 FROM claims c WHERE c.article_id = a.id)
            ORDER BY a.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(bind_len(min_chars))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(to_work_item).collect())
    }

    async fn active_companies(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT id, company_name
            FROM stock_products
            WHERE status = 'active' AND company_name IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_translation(
        &self,
        article_id: i64,
        text: &str,
        provider: &str,
        translated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE article_texts
            SET text_en = $2, en_provider = $3, en_updated_at = $4
            WHERE article_id = $1
            "#,
        )
        .bind(article_id)
        .bind(text)
        .bind(provider)
        .bind(translated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit_claims(&self, article_id: i64, claims: &[ClaimRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut rows = 0;

        for claim in claims {
            let claim_id = upsert_claim(&mut *tx, claim)
                .await
                .with_context(|| format!("upserting claim {}", claim.hash_hex()))?;
            rows += 1;

            if !claim.entities.is_empty() {
                rows += upsert_entities(&mut *tx, claim_id, &claim.entities)
                    .await
                    .with_context(|| format!("upserting entities for claim {claim_id}"))?;
            }
            if let Some(sentiment) = &claim.company_sentiment {
                rows += upsert_company_sentiment(&mut *tx, claim_id, sentiment)
                    .await
                    .with_context(|| format!("upserting sentiment for claim {claim_id}"))?;
            }
        }

        tx.commit()
            .await
            .with_context(|| format!("committing claims for article {article_id}"))?;
        Ok(rows)
    }

    async fn reset_article(&self, article_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE articles SET status = 0, http_status = NULL, fetched_at = NULL WHERE id = $1",
        )
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear_translation(&self, article_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE article_texts
            SET text_en = NULL, text_en_md5 = NULL, en_provider = NULL, en_updated_at = NULL
            WHERE article_id = $1
            "#,
        )
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health(
        &self,
        min_translation_chars: usize,
        min_extraction_chars: usize,
    ) -> Result<StoreHealth> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64, i64)>(
            r#"
            SELECT
              (SELECT COUNT(*) FROM articles),
              (SELECT COUNT(*) FROM article_texts),
              (SELECT COUNT(*) FROM article_texts
                WHERE text_en IS NOT NULL AND btrim(text_en, E' \t\n\r\f') <> ''),
              (SELECT COUNT(*) FROM claims),
              (SELECT COUNT(*) FROM entities),
              (SELECT COUNT(*) FROM company_sentiment),
              (SELECT COUNT(*) FROM article_texts t JOIN articles a ON a.id = t.article_id
                WHERE a.status = 0 AND t.text IS NOT NULL
                  AND LENGTH(btrim(t.text, E' \t\n\r\f')) >= GREATEST($1, 1)
                  AND (t.text_en IS NULL OR btrim(t.text_en, E' \t\n\r\f') = '')),
              (SELECT COUNT(*) FROM article_texts t JOIN articles a ON a.id = t.article_id
                WHERE a.status = 0 AND t.text IS NOT NULL
                  AND LENGTH(btrim(
                        COALESCE(NULLIF(btrim(t.text_en, E' \t\n\r\f'), ''), t.text),
                        E' \t\n\r\f'
                      )) > $2
                  AND NOT EXISTS (SELECT 1 FROM claims c WHERE c.article_id = a.id))
            "#,
        )
        .bind(bind_len(min_translation_chars))
        .bind(bind_len(min_extraction_chars))
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreHealth {
            articles: row.0,
            texts: row.1,
            translated: row.2,
            claims: row.3,
            entities: row.4,
            sentiments: row.5,
            pending_translation: row.6,
            pending_extraction: row.7,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed");
    }
}

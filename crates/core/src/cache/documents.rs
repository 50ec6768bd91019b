//! Cached document storage and full-text lookup.
//!
//! Documents live in a flat `documents` table; `documents_fts` mirrors the
//! searchable columns through triggers. Lookups rank with `bm25()` weighting
//! title twice as heavily as description and url. Query tokens also match
//! indexed terms within a small edit distance, read from `documents_vocab`.

use chrono::{DateTime, Utc};
use strsim::osa_distance;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use crate::Error;
use crate::model::{CacheDocument, Category, ExtractedRecord};

/// Relevance expression; column weights are title 2, description 1, url 1.
const SCORE_EXPR: &str = "-bm25(documents_fts, 2.0, 1.0, 1.0)";

/// Maximum number of query tokens turned into match terms.
const MAX_MATCH_TERMS: usize = 16;

/// Maximum indexed terms one misspelled token may expand to.
const MAX_FUZZY_EXPANSIONS: usize = 8;

/// Lowercased alphanumeric tokens of `text`.
pub fn query_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .take(MAX_MATCH_TERMS)
        .map(str::to_lowercase)
        .collect()
}

/// Edits tolerated for a token: none up to 2 characters, one up to 5, two beyond.
pub fn edit_budget(token: &str) -> usize {
    match token.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Indexed terms within `token`'s edit budget, nearest first.
///
/// Transpositions count as a single edit.
pub fn fuzzy_terms<'a>(token: &str, vocab: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let budget = edit_budget(token);
    if budget == 0 {
        return Vec::new();
    }

    let mut hits: Vec<(usize, &str)> = vocab
        .into_iter()
        .filter(|term| *term != token)
        .filter_map(|term| {
            let distance = osa_distance(token, term);
            (distance <= budget).then_some((distance, term))
        })
        .collect();
    hits.sort_unstable();
    hits.into_iter()
        .take(MAX_FUZZY_EXPANSIONS)
        .map(|(_, term)| term.to_string())
        .collect()
}

/// Build an FTS5 match expression from free text.
///
/// Each alphanumeric token becomes a quoted prefix term and the terms are
/// OR-ed together, so partial words still hit. Returns `None` when the text
/// has no searchable tokens.
pub fn match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = query_tokens(text).iter().map(|t| format!("\"{t}\"*")).collect();
    if terms.is_empty() { None } else { Some(terms.join(" OR ")) }
}

/// Near-miss indexed terms for every token of `text`.
fn vocab_expansions(conn: &rusqlite::Connection, text: &str) -> Result<Vec<String>, Error> {
    let mut stmt = conn.prepare("SELECT term FROM documents_vocab WHERE length(term) BETWEEN ?1 AND ?2")?;
    let mut expansions: Vec<String> = Vec::new();

    for token in query_tokens(text) {
        let budget = edit_budget(&token);
        if budget == 0 {
            continue;
        }
        let len = token.chars().count();
        let candidates = stmt
            .query_map(params![(len - budget) as i64, (len + budget) as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for term in fuzzy_terms(&token, candidates.iter().map(String::as_str)) {
            if !expansions.contains(&term) {
                expansions.push(term);
            }
        }
    }
    Ok(expansions)
}

/// Raw row as read from SQLite, before category and timestamp are parsed.
struct StoredRow {
    key: String,
    record: ExtractedRecord,
    category: String,
    timestamp: String,
    score: Option<f64>,
}

impl TryFrom<StoredRow> for CacheDocument {
    type Error = Error;

    fn try_from(row: StoredRow) -> Result<Self, Error> {
        let category = row
            .category
            .parse::<Category>()
            .map_err(|_| Error::CorruptDocument(format!("{}: unknown type {:?}", row.key, row.category)))?;
        let ingested_at = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| Error::CorruptDocument(format!("{}: bad timestamp: {e}", row.key)))?
            .with_timezone(&Utc);

        Ok(CacheDocument { key: row.key, record: row.record, category, ingested_at, score: row.score })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        key: row.get(0)?,
        record: ExtractedRecord {
            id: 0,
            title: row.get(1)?,
            description: row.get(2)?,
            display_url: row.get(3)?,
            full_url: row.get(4)?,
            image_url: row.get(5)?,
            thumbnail: row.get(6)?,
            duration: row.get(7)?,
            source: row.get(8)?,
            date: row.get(9)?,
        },
        category: row.get(10)?,
        timestamp: row.get(11)?,
        score: row.get(12)?,
    })
}

impl CacheDb {
    /// Insert documents, one row each.
    ///
    /// A key collision overwrites the earlier row. Returns the number of rows written.
    pub async fn insert_documents(&self, docs: Vec<CacheDocument>) -> Result<usize, Error> {
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                let mut written = 0usize;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO documents (
                            doc_key, title, description, url, full_url,
                            image_url, thumbnail, duration, source, date,
                            type, timestamp
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                        ON CONFLICT(doc_key) DO UPDATE SET
                            title = excluded.title,
                            description = excluded.description,
                            url = excluded.url,
                            full_url = excluded.full_url,
                            image_url = excluded.image_url,
                            thumbnail = excluded.thumbnail,
                            duration = excluded.duration,
                            source = excluded.source,
                            date = excluded.date,
                            type = excluded.type,
                            timestamp = excluded.timestamp",
                    )?;

                    for doc in &docs {
                        let r = &doc.record;
                        written += stmt.execute(params![
                            &doc.key,
                            &r.title,
                            &r.description,
                            &r.display_url,
                            &r.full_url,
                            &r.image_url,
                            &r.thumbnail,
                            &r.duration,
                            &r.source,
                            &r.date,
                            doc.category.as_str(),
                            doc.ingested_at.to_rfc3339(),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await
            .map_err(Error::from)
    }

    /// Full-text search over cached documents.
    ///
    /// Filters to `category` unless it is [`Category::All`]. Rows that fail to
    /// decode are skipped with a warning.
    pub async fn search_documents(
        &self, text: &str, category: Category, limit: usize,
    ) -> Result<Vec<CacheDocument>, Error> {
        let Some(expr) = match_expression(text) else {
            return Ok(Vec::new());
        };
        let text = text.to_string();
        let category = category.as_str();
        let limit = limit as i64;
        let sql = format!(
            "SELECT d.doc_key, d.title, d.description, d.url, d.full_url,
                    d.image_url, d.thumbnail, d.duration, d.source, d.date,
                    d.type, d.timestamp,
                    {SCORE_EXPR} AS score
             FROM documents_fts
             JOIN documents d ON d.rowid = documents_fts.rowid
             WHERE documents_fts MATCH ?1
               AND (?2 = 'all' OR d.type = ?2)
             ORDER BY score DESC, d.timestamp DESC
             LIMIT ?3"
        );

        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<StoredRow>, Error> {
                let mut expr = expr;
                for term in vocab_expansions(conn, &text)? {
                    expr.push_str(&format!(" OR \"{term}\""));
                }
                tracing::debug!(expr = %expr, "cache match expression");

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![expr, category, limit], read_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match CacheDocument::try_from(row) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable cache document");
                    None
                }
            })
            .collect())
    }

    /// Number of cached documents.
    pub async fn count_documents(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc(category: Category, id: u32, title: &str, description: &str, url: &str) -> CacheDocument {
        let ingested_at = Utc::now() + Duration::milliseconds(id as i64);
        let host = url::Url::parse(url).unwrap().host_str().unwrap().to_string();
        CacheDocument {
            key: CacheDocument::key_for(category, id, &ingested_at),
            record: ExtractedRecord {
                id,
                title: title.into(),
                display_url: host,
                full_url: url.into(),
                description: description.into(),
                ..Default::default()
            },
            category,
            ingested_at,
            score: None,
        }
    }

    #[test]
    fn test_match_expression() {
        assert_eq!(match_expression("Golang tutorial").unwrap(), "\"golang\"* OR \"tutorial\"*");
        assert_eq!(match_expression("c++ \"quoted\"").unwrap(), "\"c\"* OR \"quoted\"*");
        assert!(match_expression("  !!  ").is_none());
    }

    #[test]
    fn test_edit_budget() {
        assert_eq!(edit_budget("go"), 0);
        assert_eq!(edit_budget("rust"), 1);
        assert_eq!(edit_budget("golang"), 2);
    }

    #[test]
    fn test_fuzzy_terms() {
        let vocab = ["golang", "gopher", "tour", "go"];
        assert_eq!(fuzzy_terms("golnag", vocab), ["golang"]);
        assert_eq!(fuzzy_terms("tuor", vocab), ["tour"]);
        assert!(fuzzy_terms("go", vocab).is_empty());
        assert!(fuzzy_terms("python", vocab).is_empty());
        assert!(fuzzy_terms("golang", vocab).is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let written = db
            .insert_documents(vec![
                doc(Category::All, 1, "Rust", "systems language", "https://www.rust-lang.org/"),
                doc(Category::All, 2, "Go", "simple language", "https://go.dev/"),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(db.count_documents().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_title_outranks_description() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.insert_documents(vec![
            doc(Category::All, 1, "Cooking pasta", "a golang mention in passing", "https://food.example.com/"),
            doc(Category::All, 2, "Golang basics", "learn the language", "https://go.example.com/"),
        ])
        .await
        .unwrap();

        let hits = db.search_documents("golang", Category::All, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.title, "Golang basics");
        assert!(hits[0].score.unwrap() >= hits[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_search_prefix_and_stemming() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.insert_documents(vec![doc(
            Category::All,
            1,
            "Running shoes reviewed",
            "",
            "https://shoes.example.com/",
        )])
        .await
        .unwrap();

        assert_eq!(db.search_documents("run", Category::All, 10).await.unwrap().len(), 1);
        assert_eq!(db.search_documents("review", Category::All, 10).await.unwrap().len(), 1);
        assert!(db.search_documents("bicycle", Category::All, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_tolerates_typos() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.insert_documents(vec![doc(Category::All, 1, "Golang tour", "", "https://go.dev/tour/")])
            .await
            .unwrap();

        assert_eq!(db.search_documents("golnag", Category::All, 10).await.unwrap().len(), 1);
        assert_eq!(db.search_documents("golag", Category::All, 10).await.unwrap().len(), 1);
        assert_eq!(db.search_documents("toru", Category::All, 10).await.unwrap().len(), 1);
        assert!(db.search_documents("pascal", Category::All, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_filters_category() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.insert_documents(vec![
            doc(Category::All, 1, "Laptop review", "", "https://a.example.com/"),
            doc(Category::Products, 2, "Laptop deal", "$499", "https://b.example.com/"),
        ])
        .await
        .unwrap();

        let products = db.search_documents("laptop", Category::Products, 10).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].category, Category::Products);

        let all = db.search_documents("laptop", Category::All, 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let docs = (1..=5)
            .map(|i| doc(Category::All, i, &format!("Rust item {i}"), "", "https://example.com/"))
            .collect();
        db.insert_documents(docs).await.unwrap();

        assert_eq!(db.search_documents("rust", Category::All, 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_key_collision_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = doc(Category::All, 1, "Old title", "", "https://example.com/");
        let mut second = first.clone();
        second.record.title = "New title".into();

        db.insert_documents(vec![first]).await.unwrap();
        db.insert_documents(vec![second]).await.unwrap();

        assert_eq!(db.count_documents().await.unwrap(), 1);
        assert!(db.search_documents("old", Category::All, 10).await.unwrap().is_empty());
        assert_eq!(db.search_documents("new", Category::All, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_documents() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.insert_documents(vec![doc(Category::All, 1, "Rust", "", "https://example.com/")])
            .await
            .unwrap();

        db.reset().await.unwrap();

        assert_eq!(db.count_documents().await.unwrap(), 0);
        assert!(db.search_documents("rust", Category::All, 10).await.unwrap().is_empty());
    }
}

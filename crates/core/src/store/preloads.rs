//! Preload cache operations for the SQLite backend.
//!
//! Insertion order is the `seq` autoincrement column; eviction deletes the
//! lowest `seq` values of the gallery until it is back within capacity.

use tokio_rusqlite::{params, rusqlite};

use super::connection::{GalleryDb, ensure_row};
use crate::Error;
use crate::eviction::PreloadCache;

/// Preload rows of one gallery in `seq` order.
pub(crate) fn read_preloads(conn: &rusqlite::Connection, gallery_id: &str) -> Result<PreloadCache, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT page_url, image_url FROM preloaded_pages WHERE gallery_id = ?1 ORDER BY seq")?;
    let rows = stmt.query_map(params![gallery_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut cache = PreloadCache::new();
    for row in rows {
        let (page_url, image_url) = row?;
        cache.push_loaded(page_url, image_url);
    }
    Ok(cache)
}

impl GalleryDb {
    /// Preload entries of one gallery, oldest first.
    #[cfg(test)]
    pub async fn get_preloads(&self, gallery_id: &str) -> Result<PreloadCache, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<PreloadCache, Error> { Ok(read_preloads(conn, &id)?) })
            .await
            .map_err(Error::from)
    }

    /// Insert a preload entry and evict the oldest beyond `capacity`, in one transaction.
    ///
    /// An existing entry only has its image URL replaced; its `seq` is kept.
    pub async fn insert_preload_bounded(
        &self, gallery_id: &str, page_url: &str, image_url: &str, capacity: usize,
    ) -> Result<Vec<String>, Error> {
        let id = gallery_id.to_string();
        let page_url = page_url.to_string();
        let image_url = image_url.to_string();
        let capacity = i64::try_from(capacity).unwrap_or(i64::MAX);

        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                ensure_row(&tx, &id)?;

                let updated = tx.execute(
                    "UPDATE preloaded_pages SET image_url = ?3 WHERE gallery_id = ?1 AND page_url = ?2",
                    params![id, page_url, image_url],
                )?;
                if updated > 0 {
                    tx.commit()?;
                    return Ok(Vec::new());
                }

                tx.execute(
                    "INSERT INTO preloaded_pages (gallery_id, page_url, image_url) VALUES (?1, ?2, ?3)",
                    params![id, page_url, image_url],
                )?;

                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM preloaded_pages WHERE gallery_id = ?1", params![id], |row| {
                        row.get(0)
                    })?;

                let mut evicted = Vec::new();
                if count > capacity {
                    let excess = count - capacity;
                    {
                        let mut stmt = tx.prepare(
                            "SELECT page_url FROM preloaded_pages WHERE gallery_id = ?1 ORDER BY seq ASC LIMIT ?2",
                        )?;
                        let rows = stmt.query_map(params![id, excess], |row| row.get::<_, String>(0))?;
                        for row in rows {
                            evicted.push(row?);
                        }
                    }
                    tx.execute(
                        "DELETE FROM preloaded_pages WHERE seq IN (
                            SELECT seq FROM preloaded_pages WHERE gallery_id = ?1 ORDER BY seq ASC LIMIT ?2
                        )",
                        params![id, excess],
                    )?;
                }

                tx.commit()?;
                Ok(evicted)
            })
            .await
            .map_err(Error::from)
    }
}

//! Gallery row and page-link operations for the SQLite backend.

use std::collections::{BTreeMap, BTreeSet};

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

use super::connection::{GalleryDb, ensure_row};
use super::preloads::read_preloads;
use super::record::GalleryRecord;
use crate::Error;

impl GalleryDb {
    /// Read a full record: counts, every indexed page and the preload cache.
    pub async fn load_record(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<GalleryRecord>, Error> {
                let counts = conn
                    .query_row(
                        "SELECT total_pages, total_images FROM galleries WHERE gallery_id = ?1",
                        params![id],
                        |row| Ok((row.get::<_, Option<u32>>(0)?, row.get::<_, Option<u32>>(1)?)),
                    )
                    .optional()?;

                let Some((total_pages, total_images)) = counts else {
                    return Ok(None);
                };

                let mut pages = BTreeMap::new();
                let mut stmt = conn.prepare(
                    "SELECT page_index, links_json FROM gallery_pages WHERE gallery_id = ?1 ORDER BY page_index",
                )?;
                let rows = stmt.query_map(params![id], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?;
                for row in rows {
                    let (page_index, links_json) = row?;
                    pages.insert(page_index, serde_json::from_str::<Vec<String>>(&links_json)?);
                }

                let preloaded_pages = read_preloads(conn, &id)?;

                Ok(Some(GalleryRecord { pages, preloaded_pages, total_pages, total_images }))
            })
            .await
            .map_err(Error::from)
    }

    /// Overwrite whichever counts are given, creating the gallery row if needed.
    pub async fn update_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_row(&tx, &id)?;
                tx.execute(
                    "UPDATE galleries SET
                        total_pages = COALESCE(?2, total_pages),
                        total_images = COALESCE(?3, total_images)
                     WHERE gallery_id = ?1",
                    params![id, total_pages, total_images],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the links of one page.
    pub async fn upsert_page(&self, gallery_id: &str, page_index: u32, links: &[String]) -> Result<(), Error> {
        let id = gallery_id.to_string();
        let links_json = serde_json::to_string(links)?;
        let indexed_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_row(&tx, &id)?;
                tx.execute(
                    "INSERT INTO gallery_pages (gallery_id, page_index, links_json, indexed_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(gallery_id, page_index) DO UPDATE SET
                        links_json = excluded.links_json,
                        indexed_at = excluded.indexed_at",
                    params![id, page_index, links_json, indexed_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn page_indices(&self, gallery_id: &str) -> Result<BTreeSet<u32>, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<BTreeSet<u32>, Error> {
                let mut stmt = conn.prepare("SELECT page_index FROM gallery_pages WHERE gallery_id = ?1")?;
                let rows = stmt.query_map(params![id], |row| row.get::<_, u32>(0))?;
                let mut indices = BTreeSet::new();
                for row in rows {
                    indices.insert(row?);
                }
                Ok(indices)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get_page(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<String>>, Error> {
                let links_json: Option<String> = conn
                    .query_row(
                        "SELECT links_json FROM gallery_pages WHERE gallery_id = ?1 AND page_index = ?2",
                        params![id, page_index],
                        |row| row.get(0),
                    )
                    .optional()?;

                match links_json {
                    Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }
}

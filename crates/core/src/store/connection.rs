//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::{GalleryBackend, GalleryRecord, migrations};
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;
                       PRAGMA foreign_keys=ON;";

/// SQLite gallery database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Every write is committed before the call returns.
#[derive(Clone, Debug)]
pub struct GalleryDb {
    pub(crate) conn: Connection,
}

impl GalleryDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

/// Create the gallery row if it does not exist yet.
pub(crate) fn ensure_row(conn: &rusqlite::Connection, gallery_id: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO galleries (gallery_id, created_at) VALUES (?1, ?2)",
        params![gallery_id, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl GalleryBackend for GalleryDb {
    async fn load(&self, gallery_id: &str) -> Result<Option<GalleryRecord>, Error> {
        self.load_record(gallery_id).await
    }

    async fn ensure(&self, gallery_id: &str) -> Result<GalleryRecord, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { Ok(ensure_row(conn, &id)?) })
            .await
            .map_err(Error::from)?;

        self.load_record(gallery_id)
            .await?
            .ok_or_else(|| Error::Corrupt(format!("gallery {gallery_id} vanished after insert")))
    }

    async fn write_metadata(
        &self, gallery_id: &str, total_pages: Option<u32>, total_images: Option<u32>,
    ) -> Result<(), Error> {
        self.update_metadata(gallery_id, total_pages, total_images).await
    }

    async fn write_page_links(&self, gallery_id: &str, page_index: u32, links: &[String]) -> Result<(), Error> {
        self.upsert_page(gallery_id, page_index, links).await
    }

    async fn indexed_pages(&self, gallery_id: &str) -> Result<BTreeSet<u32>, Error> {
        self.page_indices(gallery_id).await
    }

    async fn page_links(&self, gallery_id: &str, page_index: u32) -> Result<Option<Vec<String>>, Error> {
        self.get_page(gallery_id, page_index).await
    }

    async fn record_preload(
        &self, gallery_id: &str, page_url: &str, image_url: &str, capacity: usize,
    ) -> Result<Vec<String>, Error> {
        self.insert_preload_bounded(gallery_id, page_url, image_url, capacity).await
    }

    async fn delete(&self, gallery_id: &str) -> Result<bool, Error> {
        let id = gallery_id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM galleries WHERE gallery_id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM galleries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn flush(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = GalleryDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = std::env::temp_dir().join(format!("pagewalk-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reopen.sqlite");
        let _ = std::fs::remove_file(&path);

        {
            let db = GalleryDb::open(&path).await.unwrap();
            db.write_page_links("g1", 0, &["a".to_string(), "b".to_string()]).await.unwrap();
            db.write_metadata("g1", Some(1), Some(2)).await.unwrap();
            db.record_preload("g1", "a", "https://img/a.jpg", 50).await.unwrap();
            db.flush().await.unwrap();
        }

        let db = GalleryDb::open(&path).await.unwrap();
        let record = db.load("g1").await.unwrap().unwrap();
        assert_eq!(record.master_list(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(record.total_pages, Some(1));
        assert_eq!(record.preloaded_pages.get("a"), Some("https://img/a.jpg"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_delete_cascades_children() {
        let db = GalleryDb::open_in_memory().await.unwrap();
        db.write_page_links("g1", 0, &["a".to_string()]).await.unwrap();
        db.record_preload("g1", "a", "img", 50).await.unwrap();
        assert!(db.delete("g1").await.unwrap());

        let orphans: i64 = db
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM gallery_pages) + (SELECT COUNT(*) FROM preloaded_pages)",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}

/// SQLite store using rusqlite
///
/// Definitions are kept as JSON text keyed by crate id; locations as one row
/// per placed block with their list position.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use super::{CrateStore, LocationIndex, StoredConfig};
use crate::crates::CrateConfig;
use crate::error::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "SqliteStore: SQLite initialized");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS crate_definitions (
                id TEXT PRIMARY KEY NOT NULL,
                data TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS crate_locations (
                crate_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                location TEXT NOT NULL,
                PRIMARY KEY (crate_id, position)
            );",
        )
        .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CrateStore for SqliteStore {
    fn load_crate_definitions(&self) -> Result<Vec<StoredConfig>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, data FROM crate_definitions ORDER BY id")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let mut configs = Vec::new();
        for row in rows {
            let config = row
                .map_err(|e| StoreError::QueryFailed(e.to_string()))
                .and_then(|(id, data)| {
                    serde_json::from_str(&data)
                        .map_err(|e| StoreError::QueryFailed(format!("crate '{id}': {e}")))
                });
            configs.push(config);
        }
        Ok(configs)
    }

    fn save_crate_definition(&self, config: &CrateConfig) -> Result<(), StoreError> {
        let data = serde_json::to_string(config)
            .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO crate_definitions (id, data) VALUES (?1, ?2)",
                params![config.id, data],
            )
            .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
        Ok(())
    }

    fn delete_crate_definition(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM crate_definitions WHERE id = ?1", params![id])
            .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
        Ok(removed > 0)
    }

    fn load_location_index(&self) -> Result<LocationIndex, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT crate_id, location FROM crate_locations ORDER BY crate_id, position")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let mut index = LocationIndex::new();
        for row in rows {
            let (crate_id, location) = row.map_err(|e| StoreError::QueryFailed(e.to_string()))?;
            index.entry(crate_id).or_default().push(location);
        }
        Ok(index)
    }

    fn save_location_index(&self, index: &LocationIndex) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
        tx.execute("DELETE FROM crate_locations", [])
            .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
        for (crate_id, locations) in index {
            for (position, location) in locations.iter().enumerate() {
                tx.execute(
                    "INSERT INTO crate_locations (crate_id, position, location) VALUES (?1, ?2, ?3)",
                    params![crate_id, position as i64, location],
                )
                .map_err(|e| StoreError::ExecuteFailed(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| StoreError::ExecuteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_and_locations() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_crate_definition(&CrateConfig::template("vote", "Vote")).unwrap();
        let mut edited = CrateConfig::template("vote", "Vote");
        edited.display_name = "&6Vote".to_string();
        store.save_crate_definition(&edited).unwrap();

        let loaded = store.load_crate_definitions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].as_ref().unwrap().display_name, "&6Vote");

        let mut index = LocationIndex::new();
        index.insert("vote".to_string(), vec!["w:3:0:0".to_string(), "w:1:0:0".to_string()]);
        store.save_location_index(&index).unwrap();
        assert_eq!(store.load_location_index().unwrap(), index);

        index.clear();
        store.save_location_index(&index).unwrap();
        assert!(store.load_location_index().unwrap().is_empty());

        assert!(store.delete_crate_definition("vote").unwrap());
        assert!(!store.delete_crate_definition("vote").unwrap());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = crate::storage::tests::scratch_dir("sqlite");
        let path = dir.join(crate::config::files::SQLITE_DB);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_crate_definition(&CrateConfig::template("daily", "Daily")).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_crate_definitions().unwrap().len(), 1);
        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use flowboard_core::board::Board;
use flowboard_core::ids::BoardId;

use crate::error::StorageError;
use crate::traits::SnapshotCache;

/// SQLite-backed snapshot cache: one rmp-encoded board per slot, with a
/// blake3 checksum over the payload. A row that fails the checksum or no
/// longer decodes reads as absent rather than erroring, since the cache is
/// never authoritative.
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn write_snapshot(&self, id: BoardId, payload: &[u8], checksum: &[u8]) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO snapshots (board_id, payload, checksum) VALUES (?1, ?2, ?3)
             ON CONFLICT (board_id) DO UPDATE SET
                 payload = excluded.payload,
                 checksum = excluded.checksum,
                 saved_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            rusqlite::params![id.as_bytes().as_slice(), payload, checksum],
        )?;
        Ok(())
    }
}

impl SnapshotCache for SqliteCache {
    fn get_snapshot(&self, id: BoardId) -> Result<Option<Board>, StorageError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT payload, checksum FROM snapshots WHERE board_id = ?1",
                rusqlite::params![id.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, checksum)) = row else {
            return Ok(None);
        };

        if blake3::hash(&payload).as_bytes() != checksum.as_slice() {
            warn!(board = %id, "snapshot checksum mismatch; treating as absent");
            return Ok(None);
        }

        match rmp_serde::from_slice(&payload) {
            Ok(board) => Ok(Some(board)),
            Err(e) => {
                warn!(board = %id, error = %e, "undecodable snapshot; treating as absent");
                Ok(None)
            }
        }
    }

    fn put_snapshot(&mut self, id: BoardId, board: &Board) -> Result<(), StorageError> {
        let payload =
            rmp_serde::to_vec(board).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let checksum = *blake3::hash(&payload).as_bytes();

        // A failed write clears the cache and retries once; the slots hold
        // nothing that cannot be refetched.
        if let Err(e) = self.write_snapshot(id, &payload, &checksum) {
            warn!(board = %id, error = %e, "snapshot write failed; clearing cache and retrying");
            self.clear()?;
            self.write_snapshot(id, &payload, &checksum)?;
        }
        Ok(())
    }

    fn remove_snapshot(&mut self, id: BoardId) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM snapshots WHERE board_id = ?1",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM snapshots", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowboard_core::ids::UserId;
    use flowboard_core::node::UserRef;

    fn board() -> Board {
        Board::new(
            "test board",
            UserRef {
                id: UserId::new(),
                name: "ada".into(),
            },
        )
    }

    #[test]
    fn round_trip_and_remove() {
        let mut cache = SqliteCache::open_in_memory().unwrap();
        let board = board();

        assert!(cache.get_snapshot(board.id).unwrap().is_none());

        cache.put_snapshot(board.id, &board).unwrap();
        let loaded = cache.get_snapshot(board.id).unwrap().unwrap();
        assert_eq!(loaded, board);

        cache.remove_snapshot(board.id).unwrap();
        assert!(cache.get_snapshot(board.id).unwrap().is_none());
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let mut cache = SqliteCache::open_in_memory().unwrap();
        let mut board = board();

        cache.put_snapshot(board.id, &board).unwrap();
        board.title = "renamed".into();
        cache.put_snapshot(board.id, &board).unwrap();

        let loaded = cache.get_snapshot(board.id).unwrap().unwrap();
        assert_eq!(loaded.title, "renamed");
    }

    #[test]
    fn corrupt_payload_reads_as_absent() {
        let mut cache = SqliteCache::open_in_memory().unwrap();
        let board = board();
        cache.put_snapshot(board.id, &board).unwrap();

        cache
            .conn
            .execute(
                "UPDATE snapshots SET payload = x'deadbeef' WHERE board_id = ?1",
                rusqlite::params![board.id.as_bytes().as_slice()],
            )
            .unwrap();

        assert!(cache.get_snapshot(board.id).unwrap().is_none());
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();
        let board = board();

        {
            let mut cache = SqliteCache::open(path).unwrap();
            cache.put_snapshot(board.id, &board).unwrap();
        }

        let cache = SqliteCache::open(path).unwrap();
        assert_eq!(cache.get_snapshot(board.id).unwrap().unwrap(), board);
    }
}

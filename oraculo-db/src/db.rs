use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

/// How long a second process waits for the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
";

/// String key-value storage for JSON blobs.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl KeyValueStore for Connection {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Falha ao ler a chave '{}'", key))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )
        .with_context(|| format!("Falha ao gravar a chave '{}'", key))?;
        Ok(())
    }
}

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("oraculo.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossível criar o diretório {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossível abrir a base {:?}", path))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Falha ao configurar o tempo de espera")?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Falha na migração")?;
    Ok(())
}

pub fn count_keys(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_get_missing_key() {
        let conn = memory_db();
        assert_eq!(conn.get("history").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let conn = memory_db();
        conn.set("locked", "true").unwrap();
        assert_eq!(conn.get("locked").unwrap().as_deref(), Some("true"));
        assert_eq!(count_keys(&conn).unwrap(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let conn = memory_db();
        conn.set("settings", "{}").unwrap();
        conn.set("settings", r#"{"entropy":0.5}"#).unwrap();
        assert_eq!(conn.get("settings").unwrap().as_deref(), Some(r#"{"entropy":0.5}"#));
        assert_eq!(count_keys(&conn).unwrap(), 1);
    }

    #[test]
    fn test_open_db_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("oraculo-test-{}", std::process::id()));
        let path = dir.join("nested").join("oraculo.db");
        let conn = open_db(&path).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(count_keys(&conn).unwrap(), 0);
        drop(conn);
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = memory_db();
        conn.set("m1", "[]").unwrap();
        migrate(&conn).unwrap();
        assert_eq!(conn.get("m1").unwrap().as_deref(), Some("[]"));
    }
}

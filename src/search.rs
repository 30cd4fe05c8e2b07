//! Full-text search index of public pages.

use diesel::{Connection as _, prelude::*, result::Error as DbError};
use failure::Fail;
use std::{fs, io, path::{Path, PathBuf}};

use crate::{
    config::Search as Config,
    db::{Connection, models as db, schema::search_index},
    models::PublicPage,
};

/// Where the search index is kept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    /// In the `search_index` table.
    Database,
    /// As one JSON file per page in a directory.
    Directory(PathBuf),
}

impl Backend {
    pub fn from_config(config: &Config) -> Backend {
        match *config {
            Config::Database => Backend::Database,
            Config::Directory { ref path } => Backend::Directory(path.clone()),
        }
    }

    /// Human-readable description of this backend.
    pub fn describe(&self) -> String {
        match *self {
            Backend::Database => "database table search_index".to_string(),
            Backend::Directory(ref path) => format!("directory {}", path.display()),
        }
    }

    /// Remove all documents from the index.
    ///
    /// Returns number of removed documents.
    pub fn clear(&self, dbconn: &Connection) -> Result<usize, IndexError> {
        let removed = match *self {
            Backend::Database => diesel::delete(search_index::table)
                .execute(dbconn)?,
            Backend::Directory(ref path) => clear_directory(path)?,
        };

        info!("Removed {} documents from search index", removed);

        Ok(removed)
    }

    /// Clear the index and re-index all public pages.
    ///
    /// The old index stays in place until the new one is complete. A directory
    /// index is built next to the old one and swapped in at the end.
    ///
    /// Returns number of indexed documents.
    pub fn rebuild(&self, dbconn: &Connection) -> Result<usize, IndexError> {
        let count = match *self {
            Backend::Database => dbconn.transaction::<_, IndexError, _>(|| {
                self.clear(dbconn)?;

                let docs = documents(dbconn)?;
                if !docs.is_empty() {
                    diesel::insert_into(search_index::table)
                        .values(&docs)
                        .execute(dbconn)?;
                }

                Ok(docs.len())
            })?,
            Backend::Directory(ref path) => {
                let docs = documents(dbconn)?;
                replace_directory(path, &docs)?;
                docs.len()
            }
        };

        info!("Indexed {} pages", count);

        Ok(count)
    }
}

/// Build search documents for all public pages.
fn documents(dbconn: &Connection) -> Result<Vec<db::SearchDocument>, DbError> {
    PublicPage::all(dbconn)?
        .iter()
        .map(|page| page.plugins(dbconn).map(|plugins| document(page, &plugins)))
        .collect()
}

/// Build a search document for a public page.
pub fn document(page: &db::PublicPage, plugins: &[db::PublicPlugin])
-> db::SearchDocument {
    let text = plugins.iter()
        .filter(|plugin| !plugin.body.is_empty())
        .map(|plugin| plugin.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    db::SearchDocument {
        page: page.id,
        title: page.title.clone(),
        text,
    }
}

/// Remove all documents from a directory index.
///
/// A directory which doesn't exist is treated as an empty index.
pub fn clear_directory(path: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut removed = 0;

    for entry in entries {
        let entry = entry?;

        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }

        removed += 1;
    }

    Ok(removed)
}

/// Replace a directory index with one containing exactly `docs`.
///
/// Documents are first written to a sibling directory, which is then renamed
/// over `path`. If anything fails the previous index is left as it was.
pub fn replace_directory(path: &Path, docs: &[db::SearchDocument])
-> Result<(), IndexError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".index-")
        .tempdir_in(parent)?;

    for doc in docs {
        write_document(staging.path(), doc)?;
    }

    // Removed together with the old index when dropped.
    let previous = tempfile::Builder::new()
        .prefix(".index-old-")
        .tempdir_in(parent)?;
    let old = previous.path().join("index");

    let had_index = match fs::rename(path, &old) {
        Ok(()) => true,
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) => return Err(err.into()),
    };

    if let Err(err) = fs::rename(staging.path(), path) {
        if had_index {
            if let Err(err) = fs::rename(&old, path) {
                error!("Could not restore search index {}: {}", path.display(), err);
            }
        }
        return Err(err.into());
    }

    Ok(())
}

/// Write a document into a directory index.
pub fn write_document(path: &Path, doc: &db::SearchDocument) -> Result<(), IndexError> {
    fs::create_dir_all(path)?;

    let file = fs::File::create(path.join(format!("{}.json", doc.page)))?;
    serde_json::to_writer(file, doc)?;

    Ok(())
}

#[derive(Debug, Fail)]
pub enum IndexError {
    #[fail(display = "Database error: {}", _0)]
    Database(#[cause] DbError),
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] io::Error),
    #[fail(display = "Cannot serialize document: {}", _0)]
    Serialize(#[cause] serde_json::Error),
}

impl_from! { for IndexError ;
    DbError => |e| IndexError::Database(e),
    io::Error => |e| IndexError::Io(e),
    serde_json::Error => |e| IndexError::Serialize(e),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> db::PublicPage {
        db::PublicPage {
            id: 7,
            parent: None,
            level: 0,
            title: "About us".into(),
            slug: "about".into(),
            published: true,
        }
    }

    fn plugin(position: i32, body: &str) -> db::PublicPlugin {
        db::PublicPlugin {
            id: position,
            page: 7,
            position,
            kind: "text".into(),
            body: body.into(),
        }
    }

    #[test]
    fn document_joins_plugins() {
        let doc = document(&page(), &[
            plugin(0, "We make pages."),
            plugin(1, ""),
            plugin(2, "Since 2009."),
        ]);

        assert_eq!(doc.page, 7);
        assert_eq!(doc.title, "About us");
        assert_eq!(doc.text, "We make pages.\n\nSince 2009.");
    }

    #[test]
    fn clear_directory_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), &document(&page(), &[])).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/8.json"), b"{}").unwrap();

        assert_eq!(clear_directory(dir.path()).unwrap(), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn clear_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(clear_directory(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn written_document_is_json() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), &document(&page(), &[plugin(0, "Hi")]))
            .unwrap();

        let data = fs::read(dir.path().join("7.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["title"], "About us");
        assert_eq!(value["text"], "Hi");
    }

    #[test]
    fn replace_directory_swaps_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index");

        let mut stale = document(&page(), &[]);
        stale.page = 8;
        write_document(&index, &stale).unwrap();

        replace_directory(&index, &[document(&page(), &[plugin(0, "Hi")])])
            .unwrap();

        assert!(index.join("7.json").exists());
        assert!(!index.join("8.json").exists());
        // No staging directories are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn replace_directory_creates_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("search/index");

        replace_directory(&index, &[document(&page(), &[])]).unwrap();

        assert_eq!(fs::read_dir(&index).unwrap().count(), 1);
        assert_eq!(fs::read_dir(dir.path().join("search")).unwrap().count(), 1);
    }

    #[test]
    fn backend_from_config() {
        assert_eq!(Backend::from_config(&Config::Database), Backend::Database);
        assert_eq!(
            Backend::from_config(&Config::Directory { path: "/var/index".into() }),
            Backend::Directory("/var/index".into()),
        );
    }
}

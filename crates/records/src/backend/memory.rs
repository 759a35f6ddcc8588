use crate::error::{ErrorKind, Result};
use crate::filter::{CountFilter, SearchKey};
use crate::models::path_str;
use crate::repo::{ContentFileStream, ContentFiles, FileOverrides};
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use gbpfl_extract::models::{Build, ContentFile};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

// (machine, build_id, cpvb, path); ordered the same way SQLite orders text.
type Key = (String, String, String, String);

fn key(machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<Key> {
    Ok((machine.to_string(), build_id.to_string(), cpvb.to_string(), path_str(path)?.to_string()))
}

fn key_of(file: &ContentFile) -> Result<Key> {
    key(file.machine(), file.build_id(), file.binpkg.cpvb.as_str(), &file.path)
}

/// Records held in process memory, lost on exit.
///
/// Streaming queries take a snapshot of the matching records when first
/// polled, so writes made while a stream is being consumed are not seen.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    files: RwLock<BTreeMap<Key, ContentFile>>,
}
impl MemoryRepository {
    fn matching<'a>(&'a self, predicate: impl Fn(&ContentFile) -> bool + Send + 'a) -> ContentFileStream<'a> {
        Box::pin(stream! {
            let snapshot: Vec<ContentFile> = {
                let files = self.files.read().await;
                files.values().filter(|file| predicate(file)).cloned().collect()
            };
            for file in snapshot {
                yield Ok(file);
            }
        })
    }
}

#[async_trait]
impl ContentFiles for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, file: &ContentFile, overrides: FileOverrides) -> Result<ContentFile> {
        let original = key_of(file)?;
        let saved = overrides.apply(file.clone());
        let replacement = key_of(&saved)?;
        let mut files = self.files.write().await;
        files.remove(&original);
        files.insert(replacement, saved.clone());
        Ok(saved)
    }

    async fn bulk_save(&self, files: &[ContentFile]) -> Result<()> {
        let entries = files.iter().map(|file| Ok((key_of(file)?, file.clone()))).collect::<Result<Vec<_>>>()?;
        self.files.write().await.extend(entries);
        Ok(())
    }

    async fn get(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<ContentFile> {
        let key = key(machine, build_id, cpvb, path)?;
        self.files.read().await.get(&key).cloned().ok_or_raise(|| ErrorKind::RecordNotFound)
    }

    async fn delete(&self, file: &ContentFile) -> Result<()> {
        let key = key_of(file)?;
        self.files.write().await.remove(&key).map(drop).ok_or_raise(|| ErrorKind::RecordNotFound)
    }

    async fn deindex_build(&self, machine: &str, build_id: &str) -> Result<u64> {
        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|(m, b, _, _), _| m != machine || b != build_id);
        Ok((before - files.len()) as u64)
    }

    async fn exists(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<bool> {
        let key = key(machine, build_id, cpvb, path)?;
        Ok(self.files.read().await.contains_key(&key))
    }

    async fn count(&self, machine: Option<&str>, build_id: Option<&str>, cpvb: Option<&str>) -> Result<u64> {
        let filter = CountFilter::new(machine, build_id, cpvb)?;
        let files = self.files.read().await;
        Ok(files.values().filter(|file| filter.matches(file)).count() as u64)
    }

    fn for_package<'a>(&'a self, machine: &'a str, build_id: &'a str, cpvb: &'a str) -> ContentFileStream<'a> {
        let filter = CountFilter::Package(machine, build_id, cpvb);
        self.matching(move |file| filter.matches(file))
    }

    fn for_build<'a>(&'a self, machine: &'a str, build_id: &'a str) -> ContentFileStream<'a> {
        let filter = CountFilter::Build(machine, build_id);
        self.matching(move |file| filter.matches(file))
    }

    fn for_machine<'a>(&'a self, machine: &'a str) -> ContentFileStream<'a> {
        let filter = CountFilter::Machine(machine);
        self.matching(move |file| filter.matches(file))
    }

    async fn get_builds(&self) -> Result<HashSet<Build>> {
        let files = self.files.read().await;
        Ok(files.keys().map(|(machine, build_id, _, _)| Build::new(machine.as_str(), build_id.as_str())).collect())
    }

    fn search<'a>(&'a self, key: &'a str, machines: Option<&'a [String]>) -> ContentFileStream<'a> {
        let key = SearchKey::parse(key);
        self.matching(move |file| {
            let machine_ok = machines.is_none_or(|machines| machines.iter().any(|machine| machine == file.machine()));
            machine_ok && key.matches(file)
        })
    }
}

//! GLEP 78 container traversal.
//!
//! A `.gpkg.tar` is an uncompressed tar whose members live under a single
//! `<pv>-<build_id>/` directory:
//!
//! ```text
//! bash-5.2_p37-1/gpkg-1
//! bash-5.2_p37-1/metadata.tar.xz
//! bash-5.2_p37-1/image.tar.xz
//! ```
//!
//! The `image.tar[.<ext>]` member is itself a (usually compressed) tar of the
//! installed tree, rooted at `image/`. We stream straight through both layers
//! without buffering either archive.

use crate::error::{ErrorKind, Result};
use crate::models::{FileEntry, Package};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use gbpfl_compress::{Compression, MAGIC_BYTES_LEN};
use std::io::{BufRead, BufReader, Read};
use std::ops::ControlFlow;
use tar::Archive;
use tracing::instrument;

/// Name of the marker member identifying a GLEP 78 container.
pub const IDENTIFIER: &str = "gpkg-1";
const IMAGE_STEM: &str = "image.tar";
const IMAGE_ROOT: &str = "image/";
// Entries in flight between the blocking walker and the async consumer.
const CHANNEL_CAPACITY: usize = 256;
// Large enough to always hold the magic bytes after the first fill.
const IMAGE_BUFFER_SIZE: usize = 64 * 1024;

/// Member names expected inside a specific package's container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: String,
}
impl Layout {
    pub fn for_package(package: &Package) -> Self {
        Self { root: format!("{}-{}/", package.pv(), package.build_id) }
    }

    /// Full member name of the identifier, e.g. `bash-5.2_p37-1/gpkg-1`.
    pub fn identifier(&self) -> String {
        format!("{}{IDENTIFIER}", self.root)
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        name.strip_prefix(&self.root) == Some(IDENTIFIER)
    }

    /// `image.tar` with any (or no) compression suffix.
    pub fn is_image(&self, name: &str) -> bool {
        name.strip_prefix(&self.root).is_some_and(|rest| {
            rest.strip_prefix(IMAGE_STEM).is_some_and(|ext| ext.is_empty() || ext.starts_with('.'))
        })
    }
}

fn member_name<R: Read>(member: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&member.path_bytes()).into_owned()
}

/// Walk the image of a package container, handing every non-directory entry
/// under `image/` to `visit` in archive order.
///
/// Returns how many entries were visited. A container with no identifier
/// ahead of the image, including an empty one, is
/// [`MissingPackageIdentifier`](ErrorKind::MissingPackageIdentifier). An
/// identified container without an image yields nothing.
#[instrument(skip(reader, visit), fields(cpv = %package.cpv, build_id = package.build_id, entries))]
pub fn walk<R: Read>(reader: R, package: &Package, visit: impl FnMut(FileEntry) -> ControlFlow<()>) -> Result<u64> {
    let layout = Layout::for_package(package);
    let mut container = Archive::new(reader);
    let mut members = 0_u64;
    let mut identified = false;
    for member in container.entries().or_raise(|| ErrorKind::Archive)? {
        let member = member.or_raise(|| ErrorKind::Archive)?;
        members += 1;
        let name = member_name(&member);
        if layout.is_identifier(&name) {
            identified = true;
            continue;
        }
        if !layout.is_image(&name) {
            continue;
        }
        if !identified {
            exn::bail!(ErrorKind::MissingPackageIdentifier(layout.identifier()));
        }
        let visited = walk_image(member, &name, visit)?;
        tracing::Span::current().record("entries", visited);
        return Ok(visited);
    }
    if !identified {
        exn::bail!(ErrorKind::MissingPackageIdentifier(layout.identifier()));
    }
    tracing::debug!(members, "container has no image");
    Ok(0)
}

fn walk_image<R: Read>(
    member: tar::Entry<'_, R>,
    name: &str,
    mut visit: impl FnMut(FileEntry) -> ControlFlow<()>,
) -> Result<u64> {
    if member.size() == 0 {
        return Ok(0);
    }
    let mut reader = BufReader::with_capacity(IMAGE_BUFFER_SIZE, member);
    let head = reader.fill_buf().or_raise(|| ErrorKind::Archive)?;
    let compression = Compression::detect(name, &head[..head.len().min(MAGIC_BYTES_LEN)])
        .or_raise(|| ErrorKind::Compression)?;
    tracing::trace!(%compression, "reading image");
    let decoder = compression.wrap_reader(reader).or_raise(|| ErrorKind::Compression)?;
    let mut image = Archive::new(decoder);
    let mut visited = 0_u64;
    for entry in image.entries().or_raise(|| ErrorKind::Archive)? {
        let entry = entry.or_raise(|| ErrorKind::Archive)?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = member_name(&entry);
        if !name.starts_with(IMAGE_ROOT) {
            continue;
        }
        let mtime = entry.header().mtime().or_raise(|| ErrorKind::Archive)?;
        visited += 1;
        if visit(FileEntry { name, mtime, size: entry.size() }).is_break() {
            break;
        }
    }
    Ok(visited)
}

/// Lazily stream the image entries of a package container.
///
/// Nothing is read until the stream is first polled. The archive is then
/// walked on the blocking thread pool, feeding a bounded channel; dropping
/// the stream stops the walk at the next entry.
pub fn extract<R>(reader: R, package: Package) -> impl Stream<Item = Result<FileEntry>> + Send
where
    R: Read + Send + 'static,
{
    stream! {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<FileEntry>>(CHANNEL_CAPACITY);
        let walker = tokio::task::spawn_blocking(move || {
            let outcome = walk(reader, &package, |entry| match tx.blocking_send(Ok(entry)) {
                Ok(()) => ControlFlow::Continue(()),
                // The consumer went away.
                Err(_) => ControlFlow::Break(()),
            });
            if let Err(err) = outcome {
                let _ = tx.blocking_send(Err(err));
            }
        });
        while let Some(item) = rx.recv().await {
            yield item;
        }
        if let Err(err) = walker.await.or_raise(|| ErrorKind::Archive) {
            yield Err(err);
        }
    }
}

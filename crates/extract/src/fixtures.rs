//! Builders for in-memory binary packages, for tests here and downstream
//! (enable the `fixtures` feature).

use crate::gpkg::{IDENTIFIER, Layout};
use crate::models::Package;
use gbpfl_compress::Compression;
use std::path::PathBuf;
use tar::{Builder, EntryType, Header};

/// A [`Package`] from the `gentoo` repository with a conventional path.
pub fn package(cpv: &str, build_id: u64) -> Package {
    let pv = cpv.split_once('/').map_or(cpv, |(_, pv)| pv);
    let category = cpv.split_once('/').map_or("", |(category, _)| category);
    Package {
        cpv: cpv.to_string(),
        repo: "gentoo".to_string(),
        path: PathBuf::from(format!("{category}/{pv}-{build_id}.gpkg.tar")),
        build_id,
        build_time: 1_739_000_000,
    }
}

enum Member {
    Dir(String),
    File { name: String, data: Vec<u8>, mtime: u64 },
}

enum Image {
    Members(Vec<Member>),
    Empty,
    Absent,
}

/// Assembles a `.gpkg.tar` laid out the way Portage writes them.
pub struct GpkgBuilder {
    root: String,
    identifier: bool,
    compression: Compression,
    image: Image,
}
impl GpkgBuilder {
    pub fn new(package: &Package) -> Self {
        let identifier = Layout::for_package(package).identifier();
        let root = identifier.trim_end_matches(IDENTIFIER).to_string();
        Self { root, identifier: true, compression: Compression::None, image: Image::Members(Vec::new()) }
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn without_identifier(mut self) -> Self {
        self.identifier = false;
        self
    }

    /// Write a zero-length image member.
    pub fn empty_image(mut self) -> Self {
        self.image = Image::Empty;
        self
    }

    pub fn without_image(mut self) -> Self {
        self.image = Image::Absent;
        self
    }

    pub fn dir(self, name: &str) -> Self {
        self.push(Member::Dir(name.to_string()))
    }

    pub fn file(self, name: &str, data: &[u8], mtime: u64) -> Self {
        self.push(Member::File { name: name.to_string(), data: data.to_vec(), mtime })
    }

    fn push(mut self, member: Member) -> Self {
        if let Image::Members(members) = &mut self.image {
            members.push(member);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut container = Builder::new(Vec::new());
        if self.identifier {
            append(&mut container, &format!("{}{IDENTIFIER}", self.root), EntryType::Regular, IDENTIFIER.as_bytes(), 0);
        }
        append(&mut container, &format!("{}metadata.tar", self.root), EntryType::Regular, &tar_of(&[]), 0);
        let image_name = format!("{}image.tar{}", self.root, self.compression.extension());
        match &self.image {
            Image::Members(members) => {
                let image = self.compression.compress(&tar_of(members)).expect("fixture image compresses");
                append(&mut container, &image_name, EntryType::Regular, &image, 0);
            },
            Image::Empty => append(&mut container, &image_name, EntryType::Regular, &[], 0),
            Image::Absent => {},
        }
        container.into_inner().expect("fixture container finishes")
    }
}

fn tar_of(members: &[Member]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());
    for member in members {
        match member {
            Member::Dir(name) => append(&mut builder, name, EntryType::Directory, &[], 0),
            Member::File { name, data, mtime } => append(&mut builder, name, EntryType::Regular, data, *mtime),
        }
    }
    builder.into_inner().expect("fixture tar finishes")
}

fn append(builder: &mut Builder<Vec<u8>>, name: &str, kind: EntryType, data: &[u8], mtime: u64) {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(data.len() as u64);
    header.set_mtime(mtime);
    header.set_mode(if kind.is_dir() { 0o755 } else { 0o644 });
    builder.append_data(&mut header, name, data).expect("fixture member appends");
}

//! Byte-stable compression and packaging.
//!
//! gzip streams carry a fixed mtime of 0 and no filename, so identical
//! logical content always yields an identical compressed byte stream — and
//! therefore an identical SHA-256. Tar bundles normalize every metadata
//! field that would otherwise leak the build environment into the hash.

use std::io::{self, Write};

use flate2::{Compression, GzBuilder};

/// Compress with a zeroed gzip header timestamp.
pub fn gzip_deterministic(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new().mtime(0).write(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Pack `(relative path, content)` pairs into a `.tar.gz` with normalized
/// metadata: mtime 0, uid/gid 0, root/root, mode 0644, entries sorted by
/// path. Rewriting the same inputs reproduces the archive byte for byte.
pub fn tar_gz_deterministic(files: &[(String, Vec<u8>)]) -> io::Result<Vec<u8>> {
    let mut sorted: Vec<&(String, Vec<u8>)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in sorted {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root")?;
        header.set_groupname("root")?;
        builder.append_data(&mut header, path, data.as_slice())?;
    }
    let tar_bytes = builder.into_inner()?;
    gzip_deterministic(&tar_bytes)
}

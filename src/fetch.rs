//! Obtains index files that are published on IPFS.
//!
//! Every chunk and bloom in the manifest is content addressed, so any
//! gateway can serve it. Files already on disk are left alone, which makes
//! a fetch safely resumable.
use std::path::Path;

use futures_util::StreamExt;
use log::info;
use reqwest::Url;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    chunk::files::{bloom_file_name, chunk_file_name},
    config::IndexDirs,
    errors::{Result, UnchainedError},
    manifest::Manifest,
};

/// Downloads every chunk and bloom listed in the manifest that is not
/// already present under `dirs`.
///
/// `gateway` is the base URL of an IPFS gateway, e.g.
/// `https://ipfs.unchainedindex.io/ipfs/`.
pub async fn fetch_index_files(manifest: &Manifest, dirs: &IndexDirs, gateway: &str) -> Result<()> {
    manifest.validate()?;
    dirs.ensure_exist()?;
    let client = reqwest::Client::new();
    let mut fetched = 0usize;
    for entry in &manifest.chunks {
        let range = entry.block_range()?;
        let chunk_dest = dirs.chunks_dir.join(chunk_file_name(&range));
        if download_one(&client, gateway, &entry.bin_hash, &chunk_dest).await? {
            fetched += 1;
        }
        let bloom_dest = dirs.blooms_dir.join(bloom_file_name(&range));
        if download_one(&client, gateway, &entry.bloom_hash, &bloom_dest).await? {
            fetched += 1;
        }
    }
    info!(
        "fetched {} of {} index files into {:?}",
        fetched,
        manifest.chunks.len() * 2,
        dirs.base
    );
    Ok(())
}

/// Streams one content-addressed file to disk. Returns false when the
/// destination already exists.
async fn download_one(
    client: &reqwest::Client,
    gateway: &str,
    hash: &str,
    dest: &Path,
) -> Result<bool> {
    if dest.exists() {
        return Ok(false);
    }
    let url = Url::parse(gateway)
        .and_then(|base| base.join(hash))
        .map_err(|e| UnchainedError::Fetch(format!("bad gateway url {}: {}", gateway, e)))?;
    info!("downloading {} to {:?}", url, dest);
    let response = client.get(url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(UnchainedError::NotFound(format!("content {}", hash)));
    }
    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(piece) = stream.next().await {
        file.write_all(&piece?).await?;
    }
    file.flush().await?;
    Ok(true)
}

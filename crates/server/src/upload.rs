//! Upload staging: write into `ready/`, then atomically rename into the
//! watched directory. The rename is the single point where a file
//! becomes visible to the watcher, so a partially-written upload can
//! never be observed as ready work.

use std::path::{Path, PathBuf};

use futures::Stream;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use churro_core::{ChurroError, Result};
use churro_sched::watch::READY_SUBDIR;

/// Reject names that could escape the staging directory.
pub fn sanitize_filename(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChurroError::Upload("filename is empty".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ChurroError::Upload(format!(
            "filename '{}' must not contain path separators or '..'",
            name
        )));
    }
    Ok(name)
}

/// Stream `chunks` into `<dir>/ready/<filename>`, fsync, then rename to
/// `<dir>/<filename>`. Returns the final path and byte count.
///
/// On a mid-stream failure (including client disconnect) the partial
/// file stays in `ready/` and nothing appears in the watched directory.
pub async fn stage_and_publish<S, B, E>(
    dir: &Path,
    filename: &str,
    mut chunks: S,
) -> Result<(PathBuf, u64)>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let filename = sanitize_filename(filename)?;
    let staging = dir.join(READY_SUBDIR);
    tokio::fs::create_dir_all(&staging).await?;

    let staged_path = staging.join(filename);
    let mut file = tokio::fs::File::create(&staged_path).await?;
    let mut bytes: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ChurroError::Upload(format!("stream aborted: {}", e)))?;
        file.write_all(chunk.as_ref()).await?;
        bytes += chunk.as_ref().len() as u64;
    }
    file.sync_all().await?;
    drop(file);

    let final_path = dir.join(filename);
    tokio::fs::rename(&staged_path, &final_path).await?;
    Ok((final_path, bytes))
}

/// Fetch `url` and publish it under `filename` via the same staging path.
pub async fn fetch_and_publish(
    http: &reqwest::Client,
    dir: &Path,
    filename: &str,
    url: &str,
) -> Result<(PathBuf, u64)> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| ChurroError::Upload(format!("fetch {}: {}", url, e)))?;
    if !resp.status().is_success() {
        return Err(ChurroError::Upload(format!(
            "fetch {}: {}",
            url,
            resp.status()
        )));
    }
    stage_and_publish(dir, filename, resp.bytes_stream()).await
}

/// Derive an upload filename from the last path segment of a URL.
pub fn filename_from_url(url: &str) -> Result<String> {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let name = trimmed.rsplit('/').next().unwrap_or("");
    if name.is_empty() || name.contains(':') {
        return Err(ChurroError::Upload(format!(
            "cannot derive a filename from url '{}'",
            url
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, Infallible>> + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn sanitize_rejects_escapes() {
        assert!(sanitize_filename("orders.csv").is_ok());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
        assert!(sanitize_filename("a/b.csv").is_err());
        assert!(sanitize_filename("a\\b.csv").is_err());
        assert!(sanitize_filename("../escape.csv").is_err());
    }

    #[test]
    fn filename_from_url_takes_last_segment() {
        assert_eq!(
            filename_from_url("https://example.com/files/orders.csv").unwrap(),
            "orders.csv"
        );
        assert_eq!(
            filename_from_url("https://example.com/files/orders.csv?sig=abc").unwrap(),
            "orders.csv"
        );
        assert!(filename_from_url("https://example.com/").is_err());
    }

    #[tokio::test]
    async fn staged_upload_lands_at_the_final_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        let (path, bytes) = stage_and_publish(dir, "orders.csv", chunks(&["a,b\n", "1,2\n"]))
            .await
            .unwrap();

        assert_eq!(path, dir.join("orders.csv"));
        assert_eq!(bytes, 8);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        // Nothing left behind in staging.
        assert!(!dir.join(READY_SUBDIR).join("orders.csv").exists());
    }

    #[tokio::test]
    async fn aborted_stream_leaves_only_a_staged_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        let failing = futures::stream::iter(vec![
            Ok::<Vec<u8>, String>(b"partial".to_vec()),
            Err("client went away".to_string()),
        ]);
        let err = stage_and_publish(dir, "orders.csv", failing).await.unwrap_err();
        assert!(err.to_string().contains("stream aborted"));

        assert!(!dir.join("orders.csv").exists());
        assert!(dir.join(READY_SUBDIR).join("orders.csv").exists());
    }
}

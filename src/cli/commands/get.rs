//! Get command - print a URL's content through the cache

use crate::cache::UrlCache;
use crate::cli::args::GetArgs;
use crate::config::Config;
use crate::error::{UrlCacheError, UrlCacheResult};
use tokio::io::{self, AsyncWriteExt};
use tracing::debug;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> UrlCacheResult<()> {
    let mut config = config.clone();
    if let Some(timeout) = args.timeout {
        config.wait.timeout_secs = timeout;
    }

    let cache = UrlCache::from_config(&config)?;
    let content = cache.get_async(args.url.as_str()).await?;
    debug!("Serving slot {} from {}", content.slot(), content.path().display());

    if args.path {
        println!("{}", content.path().display());
        return Ok(());
    }

    let mut source = tokio::fs::File::from_std(content.into_file());

    match args.output {
        Some(path) => {
            let mut out = tokio::fs::File::create(&path)
                .await
                .map_err(|e| UrlCacheError::io(format!("creating {}", path.display()), e))?;
            io::copy(&mut source, &mut out)
                .await
                .map_err(|e| UrlCacheError::io(format!("writing {}", path.display()), e))?;
            out.flush()
                .await
                .map_err(|e| UrlCacheError::io(format!("writing {}", path.display()), e))?;
        }
        None => {
            let mut stdout = io::stdout();
            io::copy(&mut source, &mut stdout)
                .await
                .map_err(|e| UrlCacheError::io("writing to stdout", e))?;
            stdout
                .flush()
                .await
                .map_err(|e| UrlCacheError::io("writing to stdout", e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_url(path: &std::path::Path) -> String {
        format!("file://{}", path.display())
    }

    #[tokio::test]
    async fn writes_output_file() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("cache");
        std::fs::create_dir(&cache_dir).unwrap();
        let source = temp.path().join("source.txt");
        std::fs::write(&source, b"hello cache").unwrap();

        let mut config = Config::default();
        config.cache.dir = Some(cache_dir.clone());
        let output = temp.path().join("out.txt");

        let args = GetArgs {
            url: file_url(&source),
            output: Some(output.clone()),
            path: false,
            timeout: None,
        };
        execute(args, &config).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"hello cache");
        assert_eq!(std::fs::read(cache_dir.join("0")).unwrap(), b"hello cache");
    }

    #[tokio::test]
    async fn missing_cache_dir_is_reported() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.dir = Some(temp.path().join("absent"));

        let args = GetArgs {
            url: "http://x/a".to_string(),
            output: None,
            path: true,
            timeout: None,
        };
        let err = execute(args, &config).await.unwrap_err();
        assert!(matches!(err, UrlCacheError::CacheDirNotFound(_)));
    }
}

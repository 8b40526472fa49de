use futures_util::StreamExt;
use inotify::{EventMask, Inotify, WatchMask};
use std::{future::Future, path::PathBuf, time::Duration};
use tokio::sync::mpsc;

enum WatchResult {
    RxDropped,
    Rearm,
}

async fn watch(
    inotify: Inotify,
    tx: &mpsc::Sender<Vec<u8>>,
    path: &PathBuf,
) -> Result<WatchResult, std::io::Error> {
    let file_name = path.file_name().unwrap().to_owned();
    let mut events = inotify.into_event_stream(vec![0u8; 4 * (1 << 10)])?;
    while let Some(ev) = events.next().await {
        let ev = ev?;
        if ev.mask.contains(EventMask::DELETE_SELF) {
            return Ok(WatchResult::Rearm);
        }
        match ev.name {
            Some(name) if name == file_name => {
                let cont = tokio::fs::read(path).await?;
                if tx.send(cont).await.is_err() {
                    return Ok(WatchResult::RxDropped);
                }
            }
            _ => (),
        }
    }
    Ok(WatchResult::Rearm)
}

pub struct FileWatcher {
    retry_delay: Duration,
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl FileWatcher {
    /// Watches the file's parent directory and yields the file's new
    /// contents every time it is written. Survives the directory vanishing
    /// by re-arming after a delay.
    pub fn watch(
        self,
        path: impl Into<PathBuf>,
    ) -> (impl Future<Output = ()>, mpsc::Receiver<Vec<u8>>) {
        let path = path.into();
        let (tx, rx) = mpsc::channel(1);

        let task = async move {
            let parent = path.parent().unwrap().to_owned();
            loop {
                tracing::debug!("Starting watch loop");
                let armed = Inotify::init().and_then(|inotify| {
                    let mut watches = inotify.watches();
                    watches.add(&parent, WatchMask::CLOSE_WRITE | WatchMask::DELETE_SELF)?;
                    drop(watches);
                    Ok(inotify)
                });

                match armed {
                    Ok(inotify) => match watch(inotify, &tx, &path).await {
                        Ok(WatchResult::RxDropped) => return,
                        Ok(WatchResult::Rearm) | Err(_) => (),
                    },
                    // maybe do something here
                    Err(_) => (),
                }

                tokio::time::sleep(self.retry_delay).await;
            }
        };
        (task, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn yields_contents_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, b"before").unwrap();

        let (task, mut rx) = FileWatcher::default().watch(path.clone());
        let watcher = tokio::spawn(task);

        // give the watch a moment to arm
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, b"after").unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("watcher timed out")
            .expect("watcher hung up");
        assert_eq!(got, b"after");

        watcher.abort();
    }
}

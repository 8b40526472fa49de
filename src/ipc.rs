use crate::{
    assign::Entry,
    cli::Command,
    unix::{self, LockFile, LockFileError},
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub fn sock_path(rt_dir: &Path) -> PathBuf {
    rt_dir.join(concat!(env!("CARGO_PKG_NAME"), ".sock"))
}

fn lock_path(rt_dir: &Path) -> PathBuf {
    rt_dir.join(concat!(env!("CARGO_PKG_NAME"), ".lock"))
}

#[derive(Serialize, Deserialize, Debug)]
pub enum Reply {
    Table(Vec<Entry>),
    Files(Vec<FileEntry>),
    Produced(Vec<PathBuf>),
    Applied { directives: usize },
    Opener { mime: String, desktop: Option<String> },
    Unit,
    Failed(String),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FileEntry {
    pub source: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

pub struct Request {
    pub cmd: Command,
    framed: Framed<UnixStream, LengthDelimitedCodec>,
}

impl Request {
    pub async fn reply(mut self, reply: Reply) -> Result<(), IpcError> {
        let ret = Bytes::from(bincode::serialize(&reply).context(BincodeSnafu)?);
        self.framed.send(ret).await.context(SendReplySnafu)
    }
}

#[derive(Snafu, Debug)]
pub enum IpcError {
    #[snafu(display("Can't connect to {}: {}", path.display(), source))]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Connection hung up before sending cmd"))]
    Hup,

    #[snafu(display("Connection hung up"))]
    IntermittentIo { source: std::io::Error },

    #[snafu(display("Can't send reply"))]
    SendReply { source: std::io::Error },

    #[snafu(display("Can't bincode"))]
    Bincode { source: bincode::Error },
}

async fn read_cmd(conn: UnixStream) -> Result<Request, IpcError> {
    let mut framed = Framed::new(conn, LengthDelimitedCodec::new());
    let buf = framed
        .next()
        .await
        .ok_or(IpcError::Hup)?
        .context(IntermittentIoSnafu)?;

    let cmd = bincode::deserialize(&buf).context(BincodeSnafu)?;

    Ok(Request { cmd, framed })
}

pub async fn send_command(sock: &Path, cmd: &Command) -> Result<Reply, IpcError> {
    let stream = UnixStream::connect(sock)
        .await
        .context(ConnectSnafu { path: sock })?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let buf = bincode::serialize(cmd).context(BincodeSnafu)?;
    framed
        .send(Bytes::from(buf))
        .await
        .context(IntermittentIoSnafu)?;

    let buf = framed
        .next()
        .await
        .ok_or(IpcError::Hup)?
        .context(IntermittentIoSnafu)?;

    bincode::deserialize(&buf).context(BincodeSnafu)
}

#[derive(Snafu, Debug)]
pub enum BindError {
    #[snafu(display(
        "Daemon is already running. Please kill the currently running instance and try again"
    ))]
    AlreadyRunning,

    #[snafu(display("Can't create runtime directory {}: {}", rt_dir.display(), source))]
    CreateRtDir {
        rt_dir: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Error when trying to create lock file in {}: {}", lockpath.display(), source))]
    CreateLock {
        lockpath: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Can't bind to socket: {}", source), context(false))]
    Bind { source: std::io::Error },
}

pub struct Listener {
    sock: UnixListener,
    // held for the daemon's lifetime
    _lockfile: LockFile,
}

impl Listener {
    /// Next decodable request. Connections that fail to accept or hand over
    /// a command are dropped and waited out, never surfaced.
    pub async fn next_request(&mut self) -> Request {
        loop {
            let conn = match self.sock.accept().await {
                Ok((conn, _)) => conn,
                Err(e) => {
                    tracing::debug!("Accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    continue;
                }
            };
            match read_cmd(conn).await {
                Ok(req) => return req,
                Err(e) => tracing::debug!("Dropped connection: {}", e),
            }
        }
    }
}

pub fn bind(rt_dir: impl AsRef<Path>) -> Result<Listener, BindError> {
    let rt_dir = rt_dir.as_ref();
    // I don't care about the permissions here
    if let Some(parent) = rt_dir.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match unix::mkdir(rt_dir, 0o700) {
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => (),
        ret => ret.context(CreateRtDirSnafu { rt_dir })?,
    }

    let lockpath = lock_path(rt_dir);
    let lockfile = LockFile::lock(&lockpath).map_err(|e| match e {
        LockFileError::Locked => BindError::AlreadyRunning,
        LockFileError::Create { source } => BindError::CreateLock { lockpath, source },
    })?;

    let sockpath = sock_path(rt_dir);
    let _ = std::fs::remove_file(&sockpath);
    let sock = UnixListener::bind(&sockpath)?;
    Ok(Listener {
        sock,
        _lockfile: lockfile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_reply_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let rt_dir = dir.path().join("rt");

        let mut listener = bind(&rt_dir).unwrap();
        let sock = sock_path(&rt_dir);

        let client = tokio::spawn(async move {
            send_command(&sock, &Command::Status).await.unwrap()
        });

        let req = listener.next_request().await;
        assert!(matches!(req.cmd, Command::Status));
        req.reply(Reply::Table(Vec::new())).await.unwrap();

        match client.await.unwrap() {
            Reply::Table(entries) => assert!(entries.is_empty()),
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}

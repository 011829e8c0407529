//! The remote file-service responder.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use protocol::{ErrorCode, ErrorMessage, FileMethod, FileRequest, OpenIntent};
use thiserror::Error;
use tracing::debug;

use super::cursor::ListCursor;
use super::entry::DirectoryEntry;
use super::open::OpenPlan;
use super::root::SandboxRoot;

/// Errors returned to the caller of a single file-service request.
#[derive(Debug, Error)]
pub enum FileServiceError {
    /// The requested path does not exist.
    #[error("path does not exist: {0}")]
    NotFound(String),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    /// Local permissions forbid the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other filesystem failure.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The request method is not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl FileServiceError {
    /// Classify an I/O error raised while serving `path`.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileServiceError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => {
                FileServiceError::PermissionDenied(path.to_string())
            }
            io::ErrorKind::NotADirectory => FileServiceError::NotADirectory(path.to_string()),
            _ => FileServiceError::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }

    /// Protocol error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            FileServiceError::NotFound(_) => ErrorCode::NotFound,
            FileServiceError::NotADirectory(_) => ErrorCode::NotADirectory,
            FileServiceError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            FileServiceError::Io { .. } => ErrorCode::Io,
            FileServiceError::Unsupported(_) => ErrorCode::Unsupported,
        }
    }

    /// Build the error message sent back to the requesting peer.
    pub fn to_error_message(&self, context: Option<&str>) -> ErrorMessage {
        ErrorMessage {
            code: self.code(),
            message: self.to_string(),
            context: context.map(str::to_string),
            recoverable: matches!(self, FileServiceError::Io { .. }),
        }
    }
}

/// Outcome of a dispatched request.
#[derive(Debug)]
pub enum FileResponse {
    /// `List` or `Stat`.
    Listing(ListCursor),
    /// `Read`.
    File(File),
}

/// Answers list, stat and read requests against one sandboxed root.
///
/// The service is stateless between requests and is shared across sessions.
#[derive(Debug, Clone)]
pub struct RemoteFileService {
    root: SandboxRoot,
}

impl RemoteFileService {
    /// Create a service over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: SandboxRoot::new(root),
        }
    }

    /// The served root directory.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Enumerate the immediate children of a directory, sorted by name.
    pub fn list(&self, path: &str) -> Result<ListCursor, FileServiceError> {
        let local = self.root.resolve(path);
        debug!(path = %path, local = %local.display(), "list");

        let metadata = fs::metadata(&local).map_err(|e| FileServiceError::from_io(path, e))?;
        if !metadata.is_dir() {
            return Err(FileServiceError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        for item in fs::read_dir(&local).map_err(|e| FileServiceError::from_io(path, e))? {
            let item = item.map_err(|e| FileServiceError::from_io(path, e))?;
            let metadata = item
                .metadata()
                .map_err(|e| FileServiceError::from_io(path, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            entries.push(DirectoryEntry::from_metadata(name, &metadata));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ListCursor::new(entries))
    }

    /// Describe a single path as a one-entry cursor.
    pub fn stat(&self, path: &str) -> Result<ListCursor, FileServiceError> {
        let local = self.root.resolve(path);
        debug!(path = %path, local = %local.display(), "stat");

        let metadata = fs::metadata(&local).map_err(|e| FileServiceError::from_io(path, e))?;
        let name = if self.root.is_root(path) {
            "/".to_string()
        } else {
            local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string())
        };

        Ok(ListCursor::single(DirectoryEntry::from_metadata(
            name, &metadata,
        )))
    }

    /// Open a file according to the client's intent.
    pub fn read(&self, path: &str, intent: &OpenIntent) -> Result<File, FileServiceError> {
        let local = self.root.resolve(path);
        let plan = OpenPlan::from_intent(intent);
        debug!(
            path = %path,
            local = %local.display(),
            access = ?plan.access,
            flags = ?plan.flags,
            "open"
        );

        plan.open(&local)
            .map_err(|e| FileServiceError::from_io(path, e))
    }

    /// Dispatch a lister method. Anything but `List` and `Stat` is
    /// unsupported here.
    pub fn file_list(
        &self,
        method: &FileMethod,
        path: &str,
    ) -> Result<ListCursor, FileServiceError> {
        match method {
            FileMethod::List => self.list(path),
            FileMethod::Stat => self.stat(path),
            other => Err(FileServiceError::Unsupported(other.as_tag().to_string())),
        }
    }

    /// Dispatch any request by its method tag.
    pub fn dispatch(&self, request: &FileRequest) -> Result<FileResponse, FileServiceError> {
        match request.file_method() {
            FileMethod::Read => self.read(&request.path, &request.open).map(FileResponse::File),
            method @ (FileMethod::List | FileMethod::Stat) => self
                .file_list(&method, &request.path)
                .map(FileResponse::Listing),
            FileMethod::Unsupported(tag) => {
                debug!(method = %tag, path = %request.path, "unsupported method");
                Err(FileServiceError::Unsupported(tag))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::fs::FileExt;
    use tempfile::TempDir;

    #[test]
    fn test_permission_denied_classified() {
        let err = FileServiceError::from_io(
            "secret.txt",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, FileServiceError::PermissionDenied(ref p) if p == "secret.txt"));

        let msg = err.to_error_message(None);
        assert_eq!(msg.code, ErrorCode::PermissionDenied);
        assert_eq!(msg.message, "permission denied: secret.txt");
        assert!(!msg.recoverable);
    }

    #[test]
    fn test_not_a_directory_classified() {
        let err = FileServiceError::from_io("a.txt/x", io::Error::from(io::ErrorKind::NotADirectory));
        assert!(matches!(err, FileServiceError::NotADirectory(_)));
        let msg = err.to_error_message(Some("read"));
        assert_eq!(msg.code, ErrorCode::NotADirectory);
        assert_eq!(msg.context.as_deref(), Some("read"));
        assert!(!msg.recoverable);
    }

    #[test]
    fn test_other_io_errors_recoverable() {
        let err = FileServiceError::from_io("a.txt", io::Error::other("disk on fire"));
        assert!(matches!(err, FileServiceError::Io { .. }));
        assert_eq!(err.code(), ErrorCode::Io);
        assert!(err.to_error_message(None).recoverable);
    }

    #[test]
    fn test_read_through_file_is_not_a_directory() {
        let (_dir, service) = service();
        let err = service
            .read("a.txt/x", &OpenIntent::read_only())
            .unwrap_err();
        assert!(matches!(err, FileServiceError::NotADirectory(_)));
    }

    fn service() -> (TempDir, RemoteFileService) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "bee").unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("readme.md"), "# hi").unwrap();
        let service = RemoteFileService::new(dir.path());
        (dir, service)
    }

    fn names(cursor: &ListCursor) -> Vec<&str> {
        cursor.entries().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_list_root_sorted() {
        let (_dir, service) = service();
        let cursor = service.list("/").unwrap();
        assert_eq!(names(&cursor), vec!["a.txt", "b.txt", "docs"]);
        assert!(cursor.entries()[2].is_dir);
        assert_eq!(cursor.entries()[0].size, 5);
    }

    #[test]
    fn test_list_subdirectory() {
        let (_dir, service) = service();
        assert_eq!(names(&service.list("docs").unwrap()), vec!["readme.md"]);
        assert_eq!(names(&service.list("/docs/").unwrap()), vec!["readme.md"]);
    }

    #[test]
    fn test_list_empty_directory() {
        let dir = TempDir::new().unwrap();
        let service = RemoteFileService::new(dir.path());
        let cursor = service.list("").unwrap();
        let page = cursor.page(0, 10);
        assert!(page.entries.is_empty());
        assert!(page.end_of_list);
    }

    #[test]
    fn test_list_missing() {
        let (_dir, service) = service();
        let err = service.list("nope").unwrap_err();
        assert!(matches!(err, FileServiceError::NotFound(_)));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_list_file_is_not_a_directory() {
        let (_dir, service) = service();
        let err = service.list("a.txt").unwrap_err();
        assert!(matches!(err, FileServiceError::NotADirectory(_)));
    }

    #[test]
    fn test_list_cannot_escape_root() {
        let (_dir, service) = service();
        let cursor = service.list("../../..").unwrap();
        assert_eq!(names(&cursor), vec!["a.txt", "b.txt", "docs"]);
    }

    #[test]
    fn test_stat_file() {
        let (_dir, service) = service();
        let cursor = service.stat("docs/readme.md").unwrap();
        assert_eq!(cursor.len(), 1);
        assert_eq!(cursor.entries()[0].name, "readme.md");
        assert_eq!(cursor.entries()[0].size, 4);
        assert!(cursor.page(0, 1).end_of_list);
    }

    #[test]
    fn test_stat_root_named_slash() {
        let (_dir, service) = service();
        let cursor = service.stat("/").unwrap();
        assert_eq!(cursor.entries()[0].name, "/");
        assert!(cursor.entries()[0].is_dir);
        assert_eq!(service.stat("..").unwrap().entries()[0].name, "/");
    }

    #[test]
    fn test_stat_missing() {
        let (_dir, service) = service();
        assert!(matches!(
            service.stat("missing.txt").unwrap_err(),
            FileServiceError::NotFound(_)
        ));
    }

    #[test]
    fn test_read_contents() {
        let (_dir, service) = service();
        let mut file = service.read("a.txt", &OpenIntent::read_only()).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_read_with_empty_intent_is_read_only() {
        let (_dir, service) = service();
        let file = service.read("a.txt", &OpenIntent::default()).unwrap();
        let mut buf = [0u8; 3];
        file.read_exact_at(&mut buf, 2).unwrap();
        assert_eq!(&buf, b"llo");
        assert!(file.write_at(b"x", 0).is_err());
    }

    #[test]
    fn test_read_missing() {
        let (_dir, service) = service();
        let err = service
            .read("missing.txt", &OpenIntent::read_only())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_file_list_rejects_read() {
        let (_dir, service) = service();
        let err = service.file_list(&FileMethod::Read, "a.txt").unwrap_err();
        assert!(matches!(err, FileServiceError::Unsupported(ref m) if m == "Read"));
    }

    #[test]
    fn test_dispatch_by_tag() {
        let (_dir, service) = service();
        assert!(matches!(
            service.dispatch(&FileRequest::list("/")).unwrap(),
            FileResponse::Listing(c) if c.len() == 3
        ));
        assert!(matches!(
            service.dispatch(&FileRequest::stat("a.txt")).unwrap(),
            FileResponse::Listing(c) if c.len() == 1
        ));
        assert!(matches!(
            service
                .dispatch(&FileRequest::read("a.txt", OpenIntent::read_only()))
                .unwrap(),
            FileResponse::File(_)
        ));
    }

    #[test]
    fn test_dispatch_unsupported_method() {
        let (_dir, service) = service();
        let request = FileRequest {
            method: "Rename".to_string(),
            path: "a.txt".to_string(),
            open: OpenIntent::default(),
        };
        let err = service.dispatch(&request).unwrap_err();
        assert_eq!(err.to_string(), "unsupported operation: Rename");

        let msg = err.to_error_message(Some("a.txt"));
        assert_eq!(msg.code, ErrorCode::Unsupported);
        assert_eq!(msg.context.as_deref(), Some("a.txt"));
        assert!(!msg.recoverable);
    }

    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteFileService>();
        assert_send_sync::<FileServiceError>();
    }
}

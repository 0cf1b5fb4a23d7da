//! Path-confined filesystem helper. Every [`SandboxFs`] is rooted at a fixed,
//! canonicalized directory; every operation rejects a path that would
//! resolve outside that root, whether via `..` components or a symlink.
//!
//! Grounded on the same normalize-then-prefix-check shape used for write
//! confinement elsewhere in this lineage of code, generalized here into a
//! standalone, reusable sandbox rather than a one-off patch-safety check.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use latex_common::Result;
use latex_common::ServiceError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// A directory beyond which this handle refuses to read, write, or delete.
#[derive(Debug, Clone)]
pub struct SandboxFs {
    root: PathBuf,
}

impl SandboxFs {
    /// Canonicalizes `root` (resolving symlinks) and requires it to already
    /// exist as a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root)?;
        if !canonical.is_dir() {
            return Err(ServiceError::InvalidRequest(format!(
                "sandbox root {} is not a directory",
                canonical.display()
            )));
        }
        Ok(Self { root: canonical })
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn rebase(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Remove `.` and resolve `..` lexically without touching the
    /// filesystem, so this works even for paths that do not exist yet.
    fn lexical_normalize(path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for comp in path.components() {
            match comp {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }

    /// Resolves symlinks along the longest *existing* prefix of `path`, then
    /// reappends the (necessarily nonexistent) remainder. This lets `contains`
    /// reject symlink escapes even for paths that are about to be created.
    fn resolve_symlinks(path: &Path) -> std::io::Result<PathBuf> {
        let mut existing = path;
        let mut remaining: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.as_os_str().is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no existing ancestor found",
                ));
            }
            if existing.exists() {
                break;
            }
            remaining.push(existing.file_name().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
            })?);
            existing = existing.parent().unwrap_or(Path::new(""));
        }
        let mut resolved = existing.canonicalize()?;
        for comp in remaining.into_iter().rev() {
            resolved.push(comp);
        }
        Ok(resolved)
    }

    /// Canonicalized, symlink- and `..`-resolved form of `p`, rebased onto
    /// the sandbox root if relative. Returns `None` if resolution fails
    /// (e.g. a dangling intermediate component).
    fn resolve(&self, p: impl AsRef<Path>) -> Option<PathBuf> {
        let rebased = self.rebase(p);
        let normalized = Self::lexical_normalize(&rebased);
        Self::resolve_symlinks(&normalized).ok()
    }

    /// True if `p` resolves to the root itself or a descendant of it.
    pub fn contains(&self, p: impl AsRef<Path>) -> bool {
        match self.resolve(&p) {
            Some(resolved) => resolved.starts_with(&self.root),
            None => false,
        }
    }

    /// Like `contains`, but excludes the root itself — used to stop the
    /// root directory from being unlinked via `rmtree`.
    fn contains_for_deletion(&self, p: impl AsRef<Path>) -> bool {
        match self.resolve(&p) {
            Some(resolved) => resolved.starts_with(&self.root) && resolved != self.root,
            None => false,
        }
    }

    fn escape_err(&self, p: &Path) -> ServiceError {
        warn!(path = %p.display(), root = %self.root.display(), "rejected path escaping sandbox root");
        ServiceError::EscapeAttempt {
            path: p.display().to_string(),
            root: self.root.display().to_string(),
        }
    }

    pub async fn makedirs(&self, p: impl AsRef<Path>) -> Result<()> {
        let p = p.as_ref();
        if !self.contains(p) {
            return Err(self.escape_err(p));
        }
        tokio::fs::create_dir_all(self.rebase(p)).await?;
        Ok(())
    }

    /// Recursive delete. Idempotent: deleting an already-absent path succeeds.
    pub async fn rmtree(&self, p: impl AsRef<Path>) -> Result<()> {
        let p = p.as_ref();
        if !self.contains_for_deletion(p) {
            return Err(self.escape_err(p));
        }
        let target = self.rebase(p);
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Depth-first walk of `p`, returned as paths relative to `p`.
    pub async fn get_all_files(&self, p: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let p = p.as_ref();
        if !self.contains(p) {
            return Err(self.escape_err(p));
        }
        let base = self.rebase(p);
        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else {
                    out.push(path.strip_prefix(&base).unwrap_or(&path).to_path_buf());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Opens `p` with `mode`. For write/append, parent directories are
    /// created on demand and the contains check covers the final path, not
    /// just the parent.
    pub async fn open(&self, p: impl AsRef<Path>, mode: OpenMode) -> Result<tokio::fs::File> {
        let p = p.as_ref();
        if !self.contains(p) {
            return Err(self.escape_err(p));
        }
        let target = self.rebase(p);
        if matches!(mode, OpenMode::Write | OpenMode::Append) {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = match mode {
            OpenMode::Read => tokio::fs::File::open(&target).await?,
            OpenMode::Write => {
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&target)
                    .await?
            }
            OpenMode::Append => {
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&target)
                    .await?
            }
        };
        Ok(file)
    }

    pub fn exists(&self, p: impl AsRef<Path>) -> Result<bool> {
        let p = p.as_ref();
        if !self.contains(p) {
            return Err(self.escape_err(p));
        }
        Ok(self.rebase(p).exists())
    }

    /// Returns a new `SandboxFs` rooted at `subpath`, which must already be
    /// contained by (and exist within) this sandbox.
    pub fn create_from(&self, subpath: impl AsRef<Path>) -> Result<SandboxFs> {
        let subpath = subpath.as_ref();
        if !self.contains(subpath) {
            return Err(self.escape_err(subpath));
        }
        SandboxFs::new(self.rebase(subpath))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, SandboxFs) {
        let dir = TempDir::new().expect("tempdir");
        let fs = SandboxFs::new(dir.path()).expect("sandbox");
        (dir, fs)
    }

    #[tokio::test]
    async fn rejects_parent_dir_escape() {
        let (_dir, fs) = sandbox();
        assert!(!fs.contains("../escaped"));
        let err = fs.makedirs("../escaped").await.unwrap_err();
        assert!(matches!(err, ServiceError::EscapeAttempt { .. }));
    }

    #[tokio::test]
    async fn open_write_creates_parent_dirs_and_roundtrips() {
        use tokio::io::AsyncReadExt;
        use tokio::io::AsyncWriteExt;

        let (_dir, fs) = sandbox();
        let mut file = fs
            .open("rel/sub/file.txt", OpenMode::Write)
            .await
            .expect("open for write");
        file.write_all(b"hello").await.expect("write");
        file.flush().await.expect("flush");
        drop(file);

        let mut read_file = fs
            .open("rel/sub/file.txt", OpenMode::Read)
            .await
            .expect("open for read");
        let mut contents = String::new();
        read_file.read_to_string(&mut contents).await.expect("read");
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn create_from_roots_a_child_sandbox() {
        let (_dir, fs) = sandbox();
        fs.makedirs("sub").await.expect("makedirs");
        let child = fs.create_from("sub").expect("create_from");
        assert!(child.contains("leaf.txt"));
        assert!(fs.contains(child.root_path()));
    }

    #[tokio::test]
    async fn rmtree_is_idempotent() {
        let (_dir, fs) = sandbox();
        fs.rmtree("does-not-exist").await.expect("idempotent delete");
        fs.makedirs("present").await.expect("makedirs");
        fs.rmtree("present").await.expect("first delete");
        fs.rmtree("present").await.expect("second delete is a no-op");
        assert!(!fs.exists("present").unwrap());
    }

    #[tokio::test]
    async fn exists_rejects_paths_outside_the_root() {
        let (_dir, fs) = sandbox();
        let err = fs.exists("../escaped").unwrap_err();
        assert!(matches!(err, ServiceError::EscapeAttempt { .. }));
    }

    #[tokio::test]
    async fn rmtree_refuses_to_delete_the_root() {
        let (_dir, fs) = sandbox();
        let err = fs.rmtree(".").await.unwrap_err();
        assert!(matches!(err, ServiceError::EscapeAttempt { .. }));
    }

    #[tokio::test]
    async fn get_all_files_is_relative_and_depth_first() {
        let (_dir, fs) = sandbox();
        fs.open("a.txt", OpenMode::Write).await.expect("a");
        fs.open("nested/b.txt", OpenMode::Write).await.expect("b");
        let mut files = fs.get_all_files(".").await.expect("walk");
        files.sort();
        assert_eq!(
            files,
            vec![PathBuf::from("a.txt"), PathBuf::from("nested/b.txt")]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejects_symlink_escape() {
        let (dir, fs) = sandbox();
        let outside = TempDir::new().expect("outside tempdir");
        let mut secret = std::fs::File::create(outside.path().join("secret.txt")).expect("secret");
        writeln!(secret, "top secret").expect("write secret");

        let link_path = dir.path().join("escape_link");
        std::os::unix::fs::symlink(outside.path(), &link_path).expect("symlink");

        assert!(!fs.contains("escape_link/secret.txt"));
        let err = fs
            .open("escape_link/secret.txt", OpenMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EscapeAttempt { .. }));
    }
}

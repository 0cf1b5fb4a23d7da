use std::collections::BTreeMap;
use std::path::PathBuf;

use latex_common::Result;
use latex_common::ServiceError;
use latex_sandboxfs::OpenMode;
use latex_sandboxfs::SandboxFs;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

use crate::record::Compiler;
use crate::record::ConvertSpec;
use crate::record::SessionRecord;
use crate::record::Status;
use crate::templates::TemplateRecord;
use crate::templates::template_file_name;

const SOURCE_DIR: &str = "source";
const TEMPLATE_DIR: &str = "templates";

/// A single compilation task: its metadata plus the two sandboxed
/// subdirectories holding its source tree and unrendered templates.
///
/// State-mutating methods enforce the `editable -> finalized -> (success |
/// error)` transitions but do not themselves persist anything; callers go
/// through `SessionManager`, which applies the mutation and saves the record
/// in one step.
pub struct Session {
    record: SessionRecord,
    source_files: SandboxFs,
    template_files: SandboxFs,
}

impl Session {
    pub(crate) async fn new(record: SessionRecord, root: SandboxFs) -> Result<Self> {
        if !root.exists(SOURCE_DIR)? {
            root.makedirs(SOURCE_DIR).await?;
        }
        if !root.exists(TEMPLATE_DIR)? {
            root.makedirs(TEMPLATE_DIR).await?;
        }
        let source_files = root.create_from(SOURCE_DIR)?;
        let template_files = root.create_from(TEMPLATE_DIR)?;
        Ok(Self {
            record,
            source_files,
            template_files,
        })
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }

    pub fn compiler(&self) -> Compiler {
        self.record.compiler
    }

    pub fn target(&self) -> &str {
        &self.record.target
    }

    pub fn convert(&self) -> Option<ConvertSpec> {
        self.record.convert
    }

    pub fn status(&self) -> Status {
        self.record.status
    }

    pub fn product(&self) -> Option<&str> {
        self.record.product.as_deref()
    }

    pub fn log(&self) -> Option<&str> {
        self.record.log.as_deref()
    }

    pub fn is_editable(&self) -> bool {
        self.record.status == Status::Editable
    }

    pub fn source_files(&self) -> &SandboxFs {
        &self.source_files
    }

    pub fn template_files(&self) -> &SandboxFs {
        &self.template_files
    }

    pub async fn files(&self) -> Result<Vec<PathBuf>> {
        self.source_files.get_all_files(".").await
    }

    /// Reads every template file and keys the result by `target`, mirroring
    /// the destination path each template expands into.
    pub async fn templates(&self) -> Result<BTreeMap<String, TemplateRecord>> {
        let files = self.template_files.get_all_files(".").await?;
        let mut out = BTreeMap::new();
        for relative in files {
            let mut handle = self.template_files.open(&relative, OpenMode::Read).await?;
            let mut contents = String::new();
            handle.read_to_string(&mut contents).await?;
            let template: TemplateRecord = serde_json::from_str(&contents)?;
            out.insert(template.target.clone(), template);
        }
        Ok(out)
    }

    /// Writes (or overwrites) a template under its deterministic filename.
    pub async fn put_template(&self, template: &TemplateRecord) -> Result<()> {
        let file_name = template_file_name(&template.target);
        let body = serde_json::to_vec(template)?;
        let mut handle = self.template_files.open(&file_name, OpenMode::Write).await?;
        handle.write_all(&body).await?;
        handle.flush().await?;
        Ok(())
    }

    pub async fn public(&self) -> Result<PublicView> {
        Ok(PublicView {
            key: self.record.key.clone(),
            created: self.record.created,
            expires_at: self.record.expires_at,
            compiler: self.record.compiler,
            target: self.record.target.clone(),
            files: self.files().await?,
            templates: self.templates().await?,
            convert: self.record.convert,
            status: self.record.status,
        })
    }

    /// Updates the rasterization spec while the session is still editable
    /// (§6 `POST /api/sessions/<id>` may carry `{convert: {...}}`
    /// independently of `{finalize: true}`).
    pub fn set_convert(&mut self, convert: Option<ConvertSpec>) -> Result<()> {
        if !self.is_editable() {
            return Err(ServiceError::InvalidState(
                "session is no longer editable and so its conversion spec cannot change".into(),
            ));
        }
        self.record.convert = convert;
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        if !self.is_editable() {
            return Err(ServiceError::InvalidState(
                "session is no longer editable and so cannot be finalized".into(),
            ));
        }
        self.record.status = Status::Finalized;
        Ok(())
    }

    pub fn set_complete(&mut self, product: String, log: String) -> Result<()> {
        if self.record.status != Status::Finalized {
            return Err(ServiceError::InvalidState(
                "session must be finalized in order to be set to complete".into(),
            ));
        }
        self.record.product = Some(product);
        self.record.log = Some(log);
        self.record.status = Status::Success;
        Ok(())
    }

    pub fn set_errored(&mut self, log: String) -> Result<()> {
        if self.record.status != Status::Finalized {
            return Err(ServiceError::InvalidState(
                "session must be finalized in order to be set to error".into(),
            ));
        }
        self.record.log = Some(log);
        self.record.status = Status::Error;
        Ok(())
    }
}

/// The non-secret, JSON-shaped view returned at the HTTP boundary. Absolute
/// `product`/`log` paths never appear here; the facade surfaces them as
/// hyperlinks instead.
#[derive(Debug, Clone, Serialize)]
pub struct PublicView {
    pub key: String,
    pub created: f64,
    pub expires_at: f64,
    pub compiler: Compiler,
    pub target: String,
    pub files: Vec<PathBuf>,
    pub templates: BTreeMap<String, TemplateRecord>,
    pub convert: Option<ConvertSpec>,
    pub status: Status,
}

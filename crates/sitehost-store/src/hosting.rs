//! Hosted site files under `hosting/<project>/`.
//!
//! Every write that produces a served entry file goes through
//! [`Store::write_hosting_file`], which applies the watermark policy with the
//! tier of the project's registered owner. Backups and the archive marker
//! are not served as entry files and are stored byte for byte.
//!
//! Project names are global. Operations on a name registered to another
//! owner are refused before anything is written.

use serde::Serialize;
use sitehost_content_client::{ContentApi, ContentToken, DirEntry, Fetched};
use sitehost_core::records::validate_segment;
use sitehost_core::watermark::is_entry_file;
use sitehost_core::{Clock, PlanTier, ProjectQuota};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::Store;

pub const HOSTING_ROOT: &str = "hosting";
pub const ENTRY_FILE: &str = "index.html";
pub const ERROR_PAGE_PATH: &str = "404.html";

/// Storage path of `file` in `project`. Both names must be single segments.
pub fn hosting_path(project: &str, file: &str) -> Result<String, StoreError> {
    validate_segment("file name", file)?;
    Ok(format!("{}/{file}", project_dir(project)?))
}

pub fn project_dir(project: &str) -> Result<String, StoreError> {
    validate_segment("project name", project)?;
    Ok(format!("{HOSTING_ROOT}/{project}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub path: String,
    pub watermarked: bool,
}

/// File listing of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub files: Vec<DirEntry>,
    pub total_size: u64,
}

/// One file of an exported project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl<A: ContentApi, C: Clock> Store<A, C> {
    /// Write a site file, applying the watermark policy to entry files.
    pub async fn write_hosting_file(
        &self,
        project: &str,
        file: &str,
        bytes: &[u8],
        tier: &PlanTier,
        label: &str,
    ) -> Result<ContentToken, StoreError> {
        let path = hosting_path(project, file)?;
        let token = if is_entry_file(file) {
            let text = String::from_utf8_lossy(bytes);
            let rendered = self.config().watermark.apply(&text, true, tier);
            debug!(path, %tier, "watermark policy applied");
            self.cached().put(&path, rendered.as_bytes(), label).await?
        } else {
            self.cached().put(&path, bytes, label).await?
        };
        Ok(token)
    }

    /// Current tier of an existing account.
    pub(crate) async fn owner_tier(&self, owner: &str) -> Result<PlanTier, StoreError> {
        self.find_user(owner)
            .await?
            .map(|u| u.plan)
            .ok_or_else(|| StoreError::not_found(format!("user {owner}")))
    }

    /// Upload one file of a project.
    ///
    /// The owner must exist and the file must fit the upload cap. Unless the
    /// owner has an elevated role, creating a new project must fit the
    /// owner's plan quota; redeploying to a project they already own always
    /// does.
    pub async fn deploy_file(
        &self,
        owner: &str,
        project: &str,
        file: &str,
        bytes: &[u8],
    ) -> Result<DeployOutcome, StoreError> {
        let user = self
            .find_user(owner)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("user {owner}")))?;

        let max = self.config().max_upload_bytes;
        if bytes.len() > max {
            return Err(StoreError::rejected(format!(
                "File too large. Max limit is {}MB.",
                max / (1024 * 1024)
            )));
        }
        let path = hosting_path(project, file)?;
        self.check_project_owner(owner, project).await?;

        if !user.role.is_elevated() {
            let plans = self.load_plans().await?;
            let projects = self.load_collection(&crate::collection::PROJECTS).await?;
            let owned: Vec<_> = projects.iter().filter(|p| p.owner == owner).collect();
            let exists = owned.iter().any(|p| p.name == project);
            let quota = plans.quota_for(&user.plan);
            if !exists && !quota.allows_another(owned.len()) {
                let limit = match quota {
                    ProjectQuota::Limited(n) => n,
                    ProjectQuota::Unlimited => 0,
                };
                return Err(StoreError::rejected(format!(
                    "Project limit reached ({limit}). Upgrade plan for more."
                )));
            }
        }

        self.write_hosting_file(project, file, bytes, &user.plan, &format!("Deploy {project}/{file}"))
            .await?;
        self.upsert_project(project, owner, None).await?;
        info!(owner, project, file, bytes = bytes.len(), "deployed file");
        Ok(DeployOutcome {
            path,
            watermarked: is_entry_file(file) && user.plan.is_free(),
        })
    }

    /// Save a file from the editor, re-deriving the watermark from the
    /// owner's current tier.
    pub async fn edit_file(
        &self,
        owner: &str,
        project: &str,
        file: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let tier = self.owner_tier(owner).await?;
        self.check_project_owner(owner, project).await?;
        self.write_hosting_file(project, file, content.as_bytes(), &tier, "Edit File")
            .await?;
        info!(owner, project, file, "edited file");
        Ok(())
    }

    /// Contents of a site file for the editor. JSON files come back
    /// pretty-printed; a missing file is `None`.
    pub async fn read_file(&self, project: &str, file: &str) -> Result<Option<String>, StoreError> {
        let path = hosting_path(project, file)?;
        match self.cached().read(&path).await? {
            Fetched::NotFound => Ok(None),
            Fetched::Text(text) => Ok(Some(text)),
            Fetched::Json(value) => serde_json::to_string_pretty(&value)
                .map(Some)
                .map_err(|source| StoreError::Encode { path, source }),
            Fetched::Directory(_) => {
                Err(sitehost_content_client::ContentStoreError::NotAFile { path }.into())
            }
        }
    }

    /// Files directly under a project and their combined size.
    pub async fn project_details(&self, project: &str) -> Result<ProjectDetails, StoreError> {
        let dir = project_dir(project)?;
        let files: Vec<DirEntry> = self
            .cached()
            .list(&dir)
            .await?
            .into_iter()
            .filter(DirEntry::is_file)
            .collect();
        if files.is_empty() {
            return Err(StoreError::not_found(format!("project {project}")));
        }
        let total_size = files.iter().map(|f| f.size).sum();
        Ok(ProjectDetails { files, total_size })
    }

    /// Site-wide not-found page at the storage root.
    pub async fn publish_error_page(&self, html: &str) -> Result<(), StoreError> {
        self.cached()
            .put(ERROR_PAGE_PATH, html.as_bytes(), "Update 404 Page")
            .await?;
        info!(path = ERROR_PAGE_PATH, "published error page");
        Ok(())
    }

    /// Download every file of a project for a source export. Paid tiers only.
    pub async fn export_project(
        &self,
        owner: &str,
        project: &str,
    ) -> Result<Vec<ExportedFile>, StoreError> {
        let tier = self.owner_tier(owner).await?;
        self.check_project_owner(owner, project).await?;
        if tier.is_free() {
            return Err(StoreError::rejected(
                "Upgrade to PRO to download source code.",
            ));
        }
        let details = self.project_details(project).await?;
        let mut files = Vec::with_capacity(details.files.len());
        for entry in &details.files {
            files.push(ExportedFile {
                name: entry.name.clone(),
                bytes: self.cached().download(entry).await?,
            });
        }
        info!(owner, project, files = files.len(), "exported project");
        Ok(files)
    }
}

//! Project registry and project-wide actions.
//!
//! Actions touch several files one after the other and are not
//! transactional: a failure part-way leaves the earlier steps in place and
//! skips the registry sync.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitehost_content_client::ContentApi;
use sitehost_core::watermark::escape_html;
use sitehost_core::{Clock, ProjectRecord, ProjectStatus};
use tracing::{debug, info, warn};

use crate::collection::{Mutation, PROJECTS};
use crate::error::StoreError;
use crate::hosting::{hosting_path, project_dir, ENTRY_FILE};
use crate::Store;

const MAINTENANCE_BACKUP: &str = "index_bak.html";
const ARCHIVE_BACKUP: &str = "index_old_backup.html";
const ARCHIVE_MARKER: &str = "archived.html";
const ARCHIVE_MARKER_TEXT: &str = "This project is archived.";

/// A project as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub name: String,
    pub url: String,
    pub status: ProjectStatus,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    MaintenanceOn,
    MaintenanceOff,
    Archive,
    Unarchive,
}

impl ProjectAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaintenanceOn => "maintenance_on",
            Self::MaintenanceOff => "maintenance_off",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
        }
    }

    /// Registry status the action leads to, if it changes it.
    fn resulting_status(&self) -> Option<ProjectStatus> {
        match self {
            Self::Archive => Some(ProjectStatus::Archived),
            Self::Unarchive => Some(ProjectStatus::Active),
            Self::MaintenanceOn | Self::MaintenanceOff => None,
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectAction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maintenance_on" => Ok(Self::MaintenanceOn),
            "maintenance_off" => Ok(Self::MaintenanceOff),
            "archive" => Ok(Self::Archive),
            "unarchive" => Ok(Self::Unarchive),
            other => Err(StoreError::rejected(format!("unknown project action {other}"))),
        }
    }
}

/// What a project deletion managed to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Whether the registry entry was dropped. Only happens when every file
    /// was deleted.
    pub record_removed: bool,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Project names are global: `hosting/<name>/` belongs to whoever
/// registered it first.
fn name_taken(project: &str) -> StoreError {
    StoreError::rejected(format!("Project name {project} is taken by another user."))
}

impl<A: ContentApi, C: Clock> Store<A, C> {
    /// Refuse when `project` is registered to someone other than `owner`.
    pub(crate) async fn check_project_owner(
        &self,
        owner: &str,
        project: &str,
    ) -> Result<(), StoreError> {
        let projects = self.load_collection(&PROJECTS).await?;
        if projects.iter().any(|p| p.name == project && p.owner != owner) {
            warn!(owner, project, "refused access to another user's project");
            return Err(name_taken(project));
        }
        Ok(())
    }

    /// Projects of `owner` with their public URLs.
    pub async fn list_projects(&self, owner: &str) -> Result<Vec<ProjectView>, StoreError> {
        let base = &self.config().public_site_base;
        Ok(self
            .load_collection(&PROJECTS)
            .await?
            .into_iter()
            .filter(|p| p.owner == owner)
            .map(|p| ProjectView {
                url: format!("{base}/hosting/{}/{ENTRY_FILE}", p.name),
                name: p.name,
                status: p.status,
                last_updated: p.created,
            })
            .collect())
    }

    /// Make sure `(name, owner)` is registered, optionally setting its
    /// status. A new entry starts out active. Nothing is written when the
    /// entry already matches; a name registered to another owner is refused.
    pub async fn upsert_project(
        &self,
        name: &str,
        owner: &str,
        status: Option<ProjectStatus>,
    ) -> Result<ProjectRecord, StoreError> {
        let now = self.now();
        let label = format!("Update Project {name}");
        self.update_collection(&PROJECTS, &label, |projects| {
            if projects.iter().any(|p| p.name == name && p.owner != owner) {
                return Err(name_taken(name));
            }
            let (idx, created) = match projects.iter().position(|p| p.is(name, owner)) {
                Some(idx) => (idx, false),
                None => {
                    projects.push(ProjectRecord::new(name, owner, now));
                    (projects.len() - 1, true)
                }
            };
            let record = &mut projects[idx];
            let changed = match status {
                Some(status) if record.status != status => {
                    record.status = status;
                    true
                }
                _ => false,
            };
            Ok(if created || changed {
                Mutation::Commit(record.clone())
            } else {
                Mutation::Skip(record.clone())
            })
        })
        .await
    }

    /// Delete every file of a project, one by one.
    ///
    /// Failures do not stop the sweep; they are collected in the report. The
    /// registry entry is removed only when nothing failed.
    pub async fn delete_project(&self, owner: &str, project: &str) -> Result<DeleteReport, StoreError> {
        self.check_project_owner(owner, project).await?;
        let mut report = DeleteReport::default();
        let mut pending = vec![project_dir(project)?];
        while let Some(dir) = pending.pop() {
            for entry in self.cached().list(&dir).await? {
                if !entry.is_file() {
                    pending.push(entry.path);
                    continue;
                }
                match self.cached().delete(&entry.path, "Delete Project").await {
                    Ok(_) => report.deleted.push(entry.path),
                    Err(e) => {
                        warn!(path = %entry.path, error = %e, "could not delete project file");
                        report.failed.push(entry.path);
                    }
                }
            }
        }

        if report.is_complete() {
            let label = format!("Delete Project {project}");
            report.record_removed = self
                .update_collection(&PROJECTS, &label, |projects| {
                    let before = projects.len();
                    projects.retain(|p| !p.is(project, owner));
                    Ok(if projects.len() < before {
                        Mutation::Commit(true)
                    } else {
                        Mutation::Skip(false)
                    })
                })
                .await?;
        }
        info!(
            owner,
            project,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "project deletion finished"
        );
        Ok(report)
    }

    /// Run a maintenance or archive action, then sync the registry.
    ///
    /// Returns the project's status afterwards.
    pub async fn project_action(
        &self,
        owner: &str,
        project: &str,
        action: ProjectAction,
    ) -> Result<ProjectStatus, StoreError> {
        let tier = self.owner_tier(owner).await?;
        self.check_project_owner(owner, project).await?;
        let index = hosting_path(project, ENTRY_FILE)?;
        let cached = self.cached();

        match action {
            ProjectAction::MaintenanceOn => {
                if let Some(current) = cached.fetch_object(&index).await? {
                    let backup = hosting_path(project, MAINTENANCE_BACKUP)?;
                    cached.put(&backup, &current.bytes, "Backup Index").await?;
                }
                let page = maintenance_page(project);
                self.write_hosting_file(project, ENTRY_FILE, page.as_bytes(), &tier, "Maintenance ON")
                    .await?;
            }
            ProjectAction::MaintenanceOff => {
                let backup = hosting_path(project, MAINTENANCE_BACKUP)?;
                match cached.fetch_object(&backup).await? {
                    Some(saved) => {
                        self.write_hosting_file(project, ENTRY_FILE, &saved.bytes, &tier, "Maintenance OFF")
                            .await?;
                        cached.delete(&backup, "Del Backup").await?;
                    }
                    None => debug!(project, "no maintenance backup, nothing to restore"),
                }
            }
            ProjectAction::Archive => {
                if let Some(current) = cached.fetch_object(&index).await? {
                    let backup = hosting_path(project, ARCHIVE_BACKUP)?;
                    cached.put(&backup, &current.bytes, "Backup for Archive").await?;
                }
                let page = archived_page(project);
                self.write_hosting_file(project, ENTRY_FILE, page.as_bytes(), &tier, "Archive Project")
                    .await?;
                let marker = hosting_path(project, ARCHIVE_MARKER)?;
                cached
                    .put(&marker, ARCHIVE_MARKER_TEXT.as_bytes(), "Archive Marker")
                    .await?;
            }
            ProjectAction::Unarchive => {
                let backup = hosting_path(project, ARCHIVE_BACKUP)?;
                let saved = cached
                    .fetch_object(&backup)
                    .await?
                    .ok_or_else(|| StoreError::rejected("Backup not found. Cannot restore."))?;
                self.write_hosting_file(project, ENTRY_FILE, &saved.bytes, &tier, "Restore Project")
                    .await?;
                cached.delete(&backup, "Cleanup Backup").await?;
                let marker = hosting_path(project, ARCHIVE_MARKER)?;
                cached.delete(&marker, "Cleanup Marker").await?;
            }
        }

        let record = self
            .upsert_project(project, owner, action.resulting_status())
            .await?;
        info!(owner, project, %action, status = ?record.status, "project action done");
        Ok(record.status)
    }
}

fn maintenance_page(project: &str) -> String {
    let title = escape_html(project);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Maintenance Mode | {title}</title>
    <style>
        body {{ margin: 0; font-family: sans-serif; background: #030712; color: #fff; display: flex; justify-content: center; align-items: center; min-height: 100vh; }}
        .card {{ background: rgba(30, 41, 59, 0.4); border: 1px solid rgba(255, 255, 255, 0.1); padding: 3rem; border-radius: 24px; text-align: center; max-width: 450px; }}
        p {{ color: #94a3b8; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>System Update</h1>
        <p>We are currently updating our server. We will be back shortly.</p>
    </div>
</body>
</html>
"#
    )
}

fn archived_page(project: &str) -> String {
    let title = escape_html(project);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Site Unavailable | {title}</title>
    <style>
        body {{ margin: 0; font-family: sans-serif; background: #020617; color: #fff; display: flex; flex-direction: column; justify-content: center; align-items: center; min-height: 100vh; }}
        p {{ color: #9ca3af; }}
    </style>
</head>
<body>
    <h1>Site Unavailable</h1>
    <p>The project you are looking for has been archived or removed by the owner.</p>
</body>
</html>
"#
    )
}

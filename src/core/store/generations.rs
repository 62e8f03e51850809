use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

use super::{Store, enum_column, json_column};
use crate::core::generation::{GeneratedAppRecord, GeneratedCode, GenerationStatus, StatusUpdate};

const APP_COLUMNS: &str = "id, prompt, user_id, status, fhir_resources, template_id, \
     generated_code, github_repo_url, sandbox_url, medplum_project_id, error_message, \
     created_at, updated_at";

fn app_from_row(row: &Row<'_>) -> rusqlite::Result<GeneratedAppRecord> {
    let status: String = row.get(3)?;
    let resources: String = row.get(4)?;
    let code: Option<String> = row.get(6)?;
    Ok(GeneratedAppRecord {
        id: row.get(0)?,
        prompt: row.get(1)?,
        user_id: row.get(2)?,
        status: enum_column(3, &status, GenerationStatus::from_status)?,
        fhir_resources: json_column(4, &resources)?,
        template_id: row.get(5)?,
        generated_code: match code {
            Some(raw) => Some(json_column::<GeneratedCode>(6, &raw)?),
            None => None,
        },
        github_repo_url: row.get(7)?,
        sandbox_url: row.get(8)?,
        medplum_project_id: row.get(9)?,
        error_message: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Store {
    pub async fn create_generated_app(
        &self,
        prompt: &str,
        user_id: &str,
        fhir_resources: &[String],
        template_id: Option<&str>,
    ) -> Result<GeneratedAppRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let resources_json = serde_json::to_string(fhir_resources)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO generated_apps (id, prompt, user_id, status, fhir_resources, template_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                prompt,
                user_id,
                GenerationStatus::Pending.as_str(),
                resources_json,
                template_id
            ],
        )?;

        let record = db.query_row(
            &format!("SELECT {} FROM generated_apps WHERE id = ?1", APP_COLUMNS),
            params![id],
            app_from_row,
        )?;
        Ok(record)
    }

    pub async fn get_generated_app(&self, id: &str) -> Result<Option<GeneratedAppRecord>> {
        let db = self.db.lock().await;
        let record = db
            .query_row(
                &format!("SELECT {} FROM generated_apps WHERE id = ?1", APP_COLUMNS),
                params![id],
                app_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Compare-and-set status write. Returns false when the persisted status
    /// was no longer `from`, in which case nothing is written.
    pub async fn transition_generated_app(
        &self,
        id: &str,
        from: GenerationStatus,
        to: GenerationStatus,
        update: &StatusUpdate,
    ) -> Result<bool> {
        let code_json = match &update.generated_code {
            Some(code) => Some(serde_json::to_string(code)?),
            None => None,
        };

        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE generated_apps SET
                status = ?1,
                error_message = COALESCE(?2, error_message),
                sandbox_url = COALESCE(?3, sandbox_url),
                github_repo_url = COALESCE(?4, github_repo_url),
                medplum_project_id = COALESCE(?5, medplum_project_id),
                generated_code = COALESCE(?6, generated_code),
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?7 AND status = ?8",
            params![
                to.as_str(),
                update.error_message,
                update.sandbox_url,
                update.github_repo_url,
                update.medplum_project_id,
                code_json,
                id,
                from.as_str()
            ],
        )?;
        Ok(rows > 0)
    }

    pub async fn list_generated_apps_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GeneratedAppRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM generated_apps WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
            APP_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], app_from_row)?;
        let mut apps = Vec::new();
        for row in rows {
            apps.push(row?);
        }
        Ok(apps)
    }
}

use std::future::Future;

use color_eyre::Result;
use sqlx::types::Json;

use super::models::{
    AnswerKey, AnswerRow, FileUpload, MarkReport, MarkRequest, SaveReport, SaveRequest, Transition,
};
use super::Db;
use crate::dates;
use crate::workflow::{answer_status, can_transition, check_save, marking_state, SaveKind, Status};

const ANSWER_SCHEMA: i64 = 1;

impl Db {
    /// Upserts one answer row per question and advances the activity, all in
    /// one transaction.
    pub async fn save_answers(&self, request: &SaveRequest) -> Result<Transition<SaveReport>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = activity_status(&mut tx, request.activity_id, request.student_id).await?
        else {
            return Ok(Transition::NotFound);
        };

        let target = match check_save(current, request.kind) {
            Ok(target) => target,
            Err(refused) => return Ok(refused.into()),
        };
        let row_status = answer_status(request.kind, target);
        let now = dates::now();

        for draft in &request.answers {
            sqlx::query(
                r#"INSERT INTO answers
                       (activity_id, student_id, question_id, answer, answer_schema,
                        reference_urls, status, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, '[]'), ?7, ?8)
                   ON CONFLICT(activity_id, question_id, student_id) DO UPDATE SET
                       answer = excluded.answer,
                       answer_schema = excluded.answer_schema,
                       reference_urls = COALESCE(?6, answers.reference_urls),
                       status = excluded.status,
                       updated_at = excluded.updated_at"#,
            )
            .bind(request.activity_id)
            .bind(request.student_id)
            .bind(draft.question_id)
            .bind(Json(&draft.answer))
            .bind(ANSWER_SCHEMA)
            .bind(draft.references.as_ref().map(Json))
            .bind(row_status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"UPDATE activities SET
                   status = ?1,
                   date_submitted = CASE WHEN ?1 = 'SUBMITTED' THEN ?2 ELSE date_submitted END,
                   date_resubmitted = CASE WHEN ?1 = 'RESUBMITTED' THEN ?2 ELSE date_resubmitted END,
                   date_set = CASE WHEN ?3 THEN COALESCE(date_set, ?2) ELSE date_set END
               WHERE id = ?4"#,
        )
        .bind(target.as_str())
        .bind(now)
        .bind(request.kind == SaveKind::Draft)
        .bind(request.activity_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "answers saved: activity_id={}, student_id={}, count={}, status={target}",
            request.activity_id,
            request.student_id,
            request.answers.len()
        );

        Ok(Transition::Applied(SaveReport {
            saved: request.answers.len(),
            answer_status: row_status,
            activity_status: target,
        }))
    }

    /// Records per-question outcomes and the final status of the activity in
    /// one transaction. Marks for questions without an answer are reported,
    /// not stored.
    pub async fn mark_answers(&self, request: &MarkRequest) -> Result<Transition<MarkReport>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = activity_status(&mut tx, request.activity_id, request.student_id).await?
        else {
            return Ok(Transition::NotFound);
        };

        let from = marking_state(current);
        if !can_transition(from, request.final_status) {
            return Ok(Transition::Refused { from: current, to: request.final_status });
        }

        let now = dates::now();
        let mut report = MarkReport::default();

        for mark in &request.marks {
            let result = sqlx::query(
                r#"UPDATE answers SET outcome = ?, comment = ?, status = ?, updated_at = ?
                   WHERE activity_id = ? AND student_id = ? AND question_id = ?"#,
            )
            .bind(mark.outcome.as_str())
            .bind(&mark.comment)
            .bind(request.final_status.as_str())
            .bind(now)
            .bind(request.activity_id)
            .bind(request.student_id)
            .bind(mark.question_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                report.missing_questions.push(mark.question_id);
            } else {
                report.updated += 1;
            }
        }

        sqlx::query(
            r#"UPDATE activities SET
                   status = ?1,
                   date_marked = ?2,
                   date_complete = CASE WHEN ?1 = 'PASSED' THEN ?2 ELSE NULL END,
                   assessor_comment = COALESCE(?3, assessor_comment)
               WHERE id = ?4"#,
        )
        .bind(request.final_status.as_str())
        .bind(now)
        .bind(&request.assessor_comment)
        .bind(request.activity_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "activity {} marked {}: updated={}, missing={}",
            request.activity_id,
            request.final_status,
            report.updated,
            report.missing_questions.len()
        );
        Ok(Transition::Applied(report))
    }

    pub async fn answers_for(&self, activity_id: i64, student_id: i64) -> Result<Vec<AnswerRow>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"SELECT question_id, answer, answer_schema, reference_urls, file_uploads,
                      status, outcome, comment, updated_at
               FROM answers
               WHERE activity_id = ? AND student_id = ?
               ORDER BY question_id"#,
        )
        .bind(activity_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The attachment list of one answer, `None` when there is no answer row.
    pub async fn attachments(&self, key: AnswerKey) -> Result<Option<Vec<FileUpload>>> {
        let uploads = sqlx::query_scalar::<_, Json<Vec<FileUpload>>>(
            r#"SELECT file_uploads FROM answers
               WHERE activity_id = ? AND student_id = ? AND question_id = ?"#,
        )
        .bind(key.activity_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(uploads.map(|Json(files)| files))
    }

    /// Appends `entry` to the answer's attachment list, creating an empty
    /// answer row if needed. `place` moves the file into its final location
    /// and runs before the commit; if it fails nothing is recorded.
    pub async fn attach_file<F, Fut>(
        &self,
        key: AnswerKey,
        entry: &FileUpload,
        place: F,
    ) -> Result<Vec<FileUpload>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, Json<Vec<FileUpload>>>(
            r#"SELECT file_uploads FROM answers
               WHERE activity_id = ? AND student_id = ? AND question_id = ?"#,
        )
        .bind(key.activity_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut files = existing.map(|Json(files)| files).unwrap_or_default();
        files.push(entry.clone());

        sqlx::query(
            r#"INSERT INTO answers (activity_id, student_id, question_id, file_uploads, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(activity_id, question_id, student_id) DO UPDATE SET
                   file_uploads = excluded.file_uploads,
                   updated_at = excluded.updated_at"#,
        )
        .bind(key.activity_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .bind(Json(&files))
        .bind(dates::now())
        .execute(&mut *tx)
        .await?;

        place().await?;
        tx.commit().await?;

        tracing::info!(
            "file {} attached to answer activity_id={}, question_id={}",
            entry.id,
            key.activity_id,
            key.question_id
        );
        Ok(files)
    }

    /// Removes one attachment entry. Returns the removed entry and the list
    /// that remains, or `None` when the answer or the file id is unknown.
    pub async fn detach_file(
        &self,
        key: AnswerKey,
        file_id: &str,
    ) -> Result<Option<(FileUpload, Vec<FileUpload>)>> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, Json<Vec<FileUpload>>>(
            r#"SELECT file_uploads FROM answers
               WHERE activity_id = ? AND student_id = ? AND question_id = ?"#,
        )
        .bind(key.activity_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(Json(mut files)) = existing else {
            return Ok(None);
        };
        let Some(position) = files.iter().position(|f| f.id == file_id) else {
            return Ok(None);
        };
        let removed = files.remove(position);

        sqlx::query(
            r#"UPDATE answers SET file_uploads = ?, updated_at = ?
               WHERE activity_id = ? AND student_id = ? AND question_id = ?"#,
        )
        .bind(Json(&files))
        .bind(dates::now())
        .bind(key.activity_id)
        .bind(key.student_id)
        .bind(key.question_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("file {file_id} detached from activity_id={}", key.activity_id);
        Ok(Some((removed, files)))
    }
}

async fn activity_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    activity_id: i64,
    student_id: i64,
) -> Result<Option<Status>> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM activities WHERE id = ? AND student_id = ?",
    )
    .bind(activity_id)
    .bind(student_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(status.map(|s| s.parse::<Status>()).transpose()?)
}

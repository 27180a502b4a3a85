use chrono::NaiveDateTime;
use color_eyre::Result;
use sqlx::types::Json;

use super::models::{
    Activity, ActivityFilter, ActivityUpdate, AssignReport, Assessment, Assignment, FileUpload,
    NewActivity, Role, Transition,
};
use super::Db;
use crate::dates;
use crate::workflow::{check_transition, Status};

const ACTIVITY_COLUMNS: &str = "a.id, a.student_id, a.course_id, a.unit_id, a.assessor_id, \
     a.status, a.date_set, a.date_submitted, a.date_marked, a.date_resubmitted, \
     a.date_complete, a.assessor_comment";

impl Db {
    pub async fn create_activity(&self, activity: &NewActivity) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO activities
                   (student_id, course_id, unit_id, assessor_id, status,
                    date_set, date_submitted, date_marked, date_resubmitted, date_complete)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(activity.student_id)
        .bind(activity.course_id)
        .bind(activity.unit_id)
        .bind(activity.assessor_id)
        .bind(activity.status.as_str())
        .bind(activity.date_set)
        .bind(activity.date_submitted)
        .bind(activity.date_marked)
        .bind(activity.date_resubmitted)
        .bind(activity.date_complete)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "activity created: id={id}, student_id={}, unit_id={}, status={}",
            activity.student_id,
            activity.unit_id,
            activity.status
        );
        Ok(id)
    }

    /// Applies the supplied fields. A status change must be a legal transition
    /// from the stored status, checked in the same transaction as the write.
    pub async fn update_activity(&self, update: &ActivityUpdate) -> Result<Transition<()>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_scalar::<_, String>("SELECT status FROM activities WHERE id = ?")
            .bind(update.id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Ok(Transition::NotFound);
        };
        let current: Status = current.parse()?;

        if let Some(to) = update.status {
            if let Err(refused) = check_transition(current, to) {
                return Ok(refused.into());
            }
        }

        sqlx::query(
            r#"UPDATE activities SET
                   status = COALESCE(?, status),
                   student_id = COALESCE(?, student_id),
                   course_id = COALESCE(?, course_id),
                   unit_id = COALESCE(?, unit_id),
                   assessor_id = COALESCE(?, assessor_id),
                   assessor_comment = COALESCE(?, assessor_comment),
                   date_set = CASE WHEN ? THEN ? ELSE date_set END,
                   date_submitted = CASE WHEN ? THEN ? ELSE date_submitted END,
                   date_marked = CASE WHEN ? THEN ? ELSE date_marked END,
                   date_resubmitted = CASE WHEN ? THEN ? ELSE date_resubmitted END,
                   date_complete = CASE WHEN ? THEN ? ELSE date_complete END
               WHERE id = ?"#,
        )
        .bind(update.status.map(Status::as_str))
        .bind(update.student_id)
        .bind(update.course_id)
        .bind(update.unit_id)
        .bind(update.assessor_id)
        .bind(&update.assessor_comment)
        .bind(update.date_set.is_some())
        .bind(patched(update.date_set))
        .bind(update.date_submitted.is_some())
        .bind(patched(update.date_submitted))
        .bind(update.date_marked.is_some())
        .bind(patched(update.date_marked))
        .bind(update.date_resubmitted.is_some())
        .bind(patched(update.date_resubmitted))
        .bind(update.date_complete.is_some())
        .bind(patched(update.date_complete))
        .bind(update.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if let Some(to) = update.status.filter(|to| *to != current) {
            tracing::info!("activity {} moved from {current} to {to}", update.id);
        }
        Ok(Transition::Applied(()))
    }

    /// Removes the activity and its answers. Returns the attachments that were
    /// attached to those answers so their files can be cleaned up, or `None`
    /// when the activity does not exist.
    pub async fn delete_activity(&self, id: i64) -> Result<Option<Vec<FileUpload>>> {
        let mut tx = self.pool.begin().await?;

        let uploads = sqlx::query_scalar::<_, Json<Vec<FileUpload>>>(
            "SELECT file_uploads FROM answers WHERE activity_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM answers WHERE activity_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await?;
        tracing::info!("activity deleted: id={id}");

        Ok(Some(uploads.into_iter().flat_map(|Json(files)| files).collect()))
    }

    pub async fn find_activity(&self, id: i64, student_id: i64) -> Result<Option<Activity>> {
        let activity = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities a WHERE a.id = ? AND a.student_id = ?"
        ))
        .bind(id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(activity)
    }

    /// Newest first.
    pub async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            r#"SELECT {ACTIVITY_COLUMNS} FROM activities a
               WHERE (?1 IS NULL OR a.id = ?1)
                 AND (?2 IS NULL OR a.student_id = ?2)
                 AND (?3 IS NULL OR a.course_id = ?3)
                 AND (?4 IS NULL OR a.unit_id = ?4)
                 AND (?5 IS NULL OR a.status = ?5)
               ORDER BY a.id DESC"#
        ))
        .bind(filter.id)
        .bind(filter.student_id)
        .bind(filter.course_id)
        .bind(filter.unit_id)
        .bind(filter.status.map(Status::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    /// A student's activities with course and unit names, newest first.
    pub async fn assessments_for(&self, student_id: i64) -> Result<Vec<Assessment>> {
        let assessments = sqlx::query_as::<_, Assessment>(&format!(
            r#"SELECT {ACTIVITY_COLUMNS}, c.course_name, u.unit_name
               FROM activities a
               JOIN courses c ON c.id = a.course_id
               JOIN units u ON u.id = a.unit_id
               WHERE a.student_id = ?
               ORDER BY a.id DESC"#
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assessments)
    }

    /// Sets the unit for every student of the class. Students that already
    /// hold an INPROGRESS activity for the same course and unit are skipped.
    pub async fn assign_unit_to_class(&self, assignment: &Assignment) -> Result<AssignReport> {
        let students = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE class_code = ? AND status = ? ORDER BY id",
        )
        .bind(&assignment.class_code)
        .bind(Role::Student.code())
        .fetch_all(&self.pool)
        .await?;

        let mut report = AssignReport::default();
        if students.is_empty() {
            return Ok(report);
        }

        let now = dates::now();
        let mut tx = self.pool.begin().await?;

        for student_id in students {
            let already_set: bool = sqlx::query_scalar(
                r#"SELECT EXISTS(
                       SELECT 1 FROM activities
                       WHERE student_id = ? AND course_id = ? AND unit_id = ? AND status = ?
                   )"#,
            )
            .bind(student_id)
            .bind(assignment.course_id)
            .bind(assignment.unit_id)
            .bind(Status::InProgress.as_str())
            .fetch_one(&mut *tx)
            .await?;

            if already_set {
                report.skipped += 1;
                continue;
            }

            let inserted = sqlx::query(
                r#"INSERT INTO activities (student_id, course_id, unit_id, assessor_id, status, date_set)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(student_id)
            .bind(assignment.course_id)
            .bind(assignment.unit_id)
            .bind(assignment.assessor_id)
            .bind(Status::InProgress.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    tracing::warn!("could not assign unit to student {student_id}: {e}");
                    report.skipped += 1;
                }
            }
        }

        tx.commit().await?;
        tracing::info!(
            "unit {} assigned to class {}: inserted={}, skipped={}",
            assignment.unit_id,
            assignment.class_code,
            report.inserted,
            report.skipped
        );
        Ok(report)
    }
}

fn patched(value: Option<Option<NaiveDateTime>>) -> Option<NaiveDateTime> {
    value.flatten()
}

use color_eyre::Result;

use super::models::{Question, QuestionInput};
use super::Db;

const QUESTION_COLUMNS: &str = "id, course_id, unit_id, question_ref, question, upload_permitted";

impl Db {
    pub async fn create_question(&self, input: &QuestionInput) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO questions (course_id, unit_id, question_ref, question, upload_permitted)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(input.course_id)
        .bind(input.unit_id)
        .bind(&input.question_ref)
        .bind(&input.question)
        .bind(input.upload_permitted)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("question created: id={id}, unit_id={}", input.unit_id);
        Ok(id)
    }

    pub async fn update_question(&self, id: i64, input: &QuestionInput) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE questions SET
                   course_id = ?, unit_id = ?, question_ref = ?, question = ?, upload_permitted = ?
               WHERE id = ?"#,
        )
        .bind(input.course_id)
        .bind(input.unit_id)
        .bind(&input.question_ref)
        .bind(&input.question)
        .bind(input.upload_permitted)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_question(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_questions(
        &self,
        unit_id: Option<i64>,
        course_id: Option<i64>,
    ) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            r#"SELECT {QUESTION_COLUMNS} FROM questions
               WHERE (?1 IS NULL OR unit_id = ?1)
                 AND (?2 IS NULL OR course_id = ?2)
               ORDER BY unit_id, question_ref COLLATE NOCASE, id"#
        ))
        .bind(unit_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    pub async fn find_question(&self, id: i64) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }
}

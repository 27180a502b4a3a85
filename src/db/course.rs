use color_eyre::Result;

use super::models::Course;
use super::Db;

impl Db {
    pub async fn create_course(&self, name: &str, code: Option<&str>) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO courses (course_name, course_code) VALUES (?, ?) RETURNING id",
        )
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("course created: id={id}, name={name}");
        Ok(id)
    }

    pub async fn update_course(&self, id: i64, name: &str, code: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE courses SET course_name = ?, course_code = ? WHERE id = ?")
            .bind(name)
            .bind(code)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Units, questions and activities of the course go with it.
    pub async fn delete_course(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_courses(&self, id: Option<i64>) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            r#"SELECT id, course_name, course_code FROM courses
               WHERE (?1 IS NULL OR id = ?1)
               ORDER BY course_name COLLATE NOCASE, id"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }
}

use color_eyre::Result;

use super::models::Unit;
use super::Db;

impl Db {
    pub async fn create_unit(&self, course_id: i64, name: &str, code: Option<&str>) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO units (course_id, unit_name, unit_code) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(course_id)
        .bind(name)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("unit created: id={id}, course_id={course_id}");
        Ok(id)
    }

    pub async fn update_unit(
        &self,
        id: i64,
        course_id: i64,
        name: &str,
        code: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE units SET course_id = ?, unit_name = ?, unit_code = ? WHERE id = ?",
        )
        .bind(course_id)
        .bind(name)
        .bind(code)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_unit(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM units WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_units(&self, id: Option<i64>, course_id: Option<i64>) -> Result<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(
            r#"SELECT id, course_id, unit_name, unit_code FROM units
               WHERE (?1 IS NULL OR id = ?1)
                 AND (?2 IS NULL OR course_id = ?2)
               ORDER BY course_id, unit_name COLLATE NOCASE, id"#,
        )
        .bind(id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(units)
    }
}

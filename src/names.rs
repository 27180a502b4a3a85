/// A route served at its own path and at the script-style path the web
/// client was written against.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub path: &'static str,
    pub script: &'static str,
}

impl Endpoint {
    const fn new(path: &'static str, script: &'static str) -> Self {
        Self { path, script }
    }

    pub fn paths(self) -> [&'static str; 2] {
        [self.path, self.script]
    }
}

pub const HEALTH_URL: &str = "/health";

pub const CREATE_USER: Endpoint = Endpoint::new("/create-user", "/createUser.php");
pub const UPDATE_USER: Endpoint = Endpoint::new("/update-user", "/updateUser.php");
pub const UPDATE_SELF: Endpoint = Endpoint::new("/update-self", "/updateSelf.php");
pub const DELETE_USER: Endpoint = Endpoint::new("/delete-user", "/deleteUser.php");
pub const GET_USERS: Endpoint = Endpoint::new("/get-users", "/getUsers.php");
pub const GET_CLASS_CODES: Endpoint = Endpoint::new("/get-class-codes", "/getClassCodes.php");
pub const BULK_UPLOAD_USERS: Endpoint = Endpoint::new("/bulk-upload-users", "/bulkUploadUsers.php");

pub const LOGIN: Endpoint = Endpoint::new("/login", "/getLogin.php");
pub const CHANGE_PASSWORD: Endpoint = Endpoint::new("/change-password", "/changePassword.php");
pub const REQUEST_PASSWORD_RESET: Endpoint = Endpoint::new("/request-password-reset", "/requestPasswordReset.php");

pub const CREATE_COURSE: Endpoint = Endpoint::new("/create-course", "/createCourse.php");
pub const UPDATE_COURSE: Endpoint = Endpoint::new("/update-course", "/updateCourse.php");
pub const DELETE_COURSE: Endpoint = Endpoint::new("/delete-course", "/deleteCourse.php");
pub const GET_COURSES: Endpoint = Endpoint::new("/get-courses", "/getCourses.php");

pub const CREATE_UNIT: Endpoint = Endpoint::new("/create-unit", "/createUnit.php");
pub const UPDATE_UNIT: Endpoint = Endpoint::new("/update-unit", "/updateUnit.php");
pub const DELETE_UNIT: Endpoint = Endpoint::new("/delete-unit", "/deleteUnit.php");
pub const GET_UNITS: Endpoint = Endpoint::new("/get-units", "/getUnits.php");

pub const CREATE_QUESTION: Endpoint = Endpoint::new("/create-question", "/createQuestion.php");
pub const UPDATE_QUESTION: Endpoint = Endpoint::new("/update-question", "/updateQuestion.php");
pub const DELETE_QUESTION: Endpoint = Endpoint::new("/delete-question", "/deleteQuestion.php");
pub const GET_QUESTIONS: Endpoint = Endpoint::new("/get-questions", "/getQuestions.php");

pub const CREATE_ACTIVITY: Endpoint = Endpoint::new("/create-current-activity", "/createCurrentActivity.php");
pub const UPDATE_ACTIVITY: Endpoint = Endpoint::new("/update-current-activity", "/updateCurrentActivity.php");
pub const DELETE_ACTIVITY: Endpoint = Endpoint::new("/delete-current-activity", "/deleteCurrentActivity.php");
pub const GET_ACTIVITIES: Endpoint = Endpoint::new("/get-current-activities", "/getCurrentActivities.php");
pub const GET_ASSESSMENTS: Endpoint = Endpoint::new("/get-assessments", "/getAssessments.php");
pub const ASSIGN_UNIT: Endpoint = Endpoint::new("/assign-unit-to-class", "/assignUnitToClass.php");

pub const SAVE_ANSWERS: Endpoint = Endpoint::new("/save-answers", "/saveAnswers.php");
pub const MARK_ANSWERS: Endpoint = Endpoint::new("/mark-answers", "/markAnswers.php");
pub const GET_ANSWERS: Endpoint = Endpoint::new("/get-answers", "/getAnswers.php");

pub const UPLOAD_FILE: Endpoint = Endpoint::new("/upload-answer-file", "/uploadAnswerFile.php");
pub const DOWNLOAD_FILE: Endpoint = Endpoint::new("/download-answer-file", "/downloadAnswerFile.php");
pub const DELETE_FILE: Endpoint = Endpoint::new("/delete-answer-file", "/deleteAnswerFile.php");

pub fn download_url(
    api_base: &str,
    activity_id: i64,
    student_id: i64,
    question_id: i64,
    file_id: &str,
) -> String {
    format!(
        "{api_base}{}?activityId={activity_id}&studentId={student_id}&questionId={question_id}&fileId={file_id}",
        DOWNLOAD_FILE.path
    )
}

// Attachments
pub const MAX_UPLOAD_BYTES: u64 = 15 * 1024 * 1024;
/// Request body limit on the upload route; leaves room for multipart framing
/// so oversize files reach the size check.
pub const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "gif", "png", "jpg", "jpeg", "doc", "docx", "xls", "xlsm", "pdf",
];
pub const STAGING_DIR: &str = ".staging";

// Marking
pub const MARK_COMMENT_MAX_CHARS: usize = 500;

// Accounts
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const PASSWORD_RESET_MESSAGE: &str =
    "Password reset request has been sent to your teacher. Please see them during lesson time.";

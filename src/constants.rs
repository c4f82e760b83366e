/// Columns shown first, in this order, when present in the data.
pub const PREFERRED_COLUMN_ORDER: &[&str] = &[
    "id",
    "created_at",
    "episode_name",
    "script_status",
    "text_files_status",
    "podcast_status",
    "source_pdf",
    "interview_script_1",
    "interview_script_2",
    "interview_script_3",
    "interview_script_4",
    "full_script",
    "interview_file",
    "episode_title",
    "alt_title",
    "description",
    "intro_transcript",
    "social_post",
    "show_notes",
    "excerpt",
    "intro_audio",
    "master_audio",
    "cover_art",
    "scheduled_date",
    "unix_timestamp",
    "publish_date",
    "publish_time",
];

pub const DATE_COLUMNS: &[&str] = &["created_at", "scheduled_date", "publish_date"];

pub const TEXT_COLUMNS: &[&str] = &[
    "episode_name",
    "script_status",
    "text_files_status",
    "podcast_status",
    "source_pdf",
    "interview_script_1",
    "interview_script_2",
    "interview_script_3",
    "interview_script_4",
    "full_script",
    "interview_file",
    "episode_title",
    "alt_title",
    "description",
    "intro_transcript",
    "social_post",
    "show_notes",
    "excerpt",
    "intro_audio",
    "master_audio",
    "cover_art",
    "publish_time",
];

pub mod intervals {
    use std::time::Duration;

    pub const SUBMISSION_POLL: Duration = Duration::from_millis(1000);

    pub const SUBMISSION_TIMEOUT: Duration = Duration::from_secs(120);

    pub const CHANGE_FEED_POLL: Duration = Duration::from_secs(2);
}

pub mod webhook {
    pub const EPISODE_NAME_FIELD: &str = "episodeName";

    pub const PDF_FILE_FIELD: &str = "pdfFile";

    pub const PDF_MIME: &str = "application/pdf";
}

pub mod limits {
    pub const MAX_EPISODE_NAME_LEN: usize = 200;

    pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line and environment configuration of the `uploader` binary.
#[derive(Debug, Parser, Clone)]
#[command(name = "uploader", about = "Student batch upload pipeline for the batch-management API")]
pub struct Config {
    /// Base URL of the batch-management backend.
    #[clap(long, env = "UPLOADER_BASE_URL")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[clap(long, env = "UPLOADER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[clap(long, env = "UPLOADER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// How many backend failures to print before summarizing the rest.
    #[clap(long, env = "UPLOADER_ERROR_PREVIEW_LIMIT", default_value_t = 5)]
    pub error_preview_limit: usize,

    /// Treat the mobile number as a required column.
    #[clap(long, env = "UPLOADER_REQUIRE_MOBILE", default_value_t = false)]
    pub require_mobile: bool,

    /// Where generated CSV files are written.
    #[clap(long, env = "UPLOADER_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List campuses.
    Campuses,
    /// List courses offered by the given campuses.
    Courses {
        #[clap(long = "campus-id", required = true)]
        campus_ids: Vec<String>,
    },
    /// List batches.
    Batches,
    /// Write an empty upload template seeded with campus and course names.
    Template {
        #[clap(long = "campus", required = true)]
        campuses: Vec<String>,
        #[clap(long = "course", required = true)]
        courses: Vec<String>,
    },
    /// Parse and validate a roster file without creating anything.
    Preview {
        file: PathBuf,
        #[clap(long)]
        campus_id: String,
    },
    /// Validate a roster file and create a batch from its valid rows.
    Create {
        file: PathBuf,
        #[clap(long)]
        name: String,
        #[clap(long = "campus-id", required = true)]
        campus_ids: Vec<String>,
        #[clap(long = "course-id", required = true)]
        course_ids: Vec<String>,
    },
    /// Rename a batch.
    Rename { id: String, name: String },
    /// Delete a batch. This cannot be undone.
    Delete { id: String },
}

impl Config {
    pub fn rules(&self) -> crate::validator::Rules {
        crate::validator::Rules {
            require_mobile: self.require_mobile,
        }
    }
}

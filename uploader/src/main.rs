use anyhow::{bail, Context, Result};
use clap::Parser;
use common::model::id::Id;
use env_logger::Env;
use log::{error, info};
use std::io::Write;
use uploader::api::{ApiClient, BatchApi};
use uploader::board::BatchBoard;
use uploader::committer::{BatchDraft, CommitError, CommitKind};
use uploader::config::{Command, Config};
use uploader::export::{self, ONE_TIME_WARNING};
use uploader::intake::FileUpload;
use uploader::session::Session;
use uploader::validator::ValidationReport;
use uploader::workflow::{Settings, UploadWorkflow, WorkflowError};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    env_logger::init_from_env(Env::default().default_filter_or(config.log_level.as_str()));

    let session = Session::new(&config.base_url, config.token.clone())
        .with_context(|| format!("invalid base URL {}", config.base_url))?;
    let api = ApiClient::new(&session)?;
    info!("using batch-management API at {}", session.base_url);

    let settings = Settings {
        rules: config.rules(),
        error_preview_limit: config.error_preview_limit,
    };

    match config.command.clone() {
        Command::Campuses => {
            for campus in api.list_campuses().await? {
                println!("{}\t{}", campus.id, campus.name);
            }
        }
        Command::Courses { campus_ids } => {
            let ids: Vec<Id> = campus_ids.into_iter().map(Id::from).collect();
            for course in api.list_courses(&ids).await? {
                println!("{}\t{}", course.id, course.name);
            }
        }
        Command::Batches => {
            let mut board = BatchBoard::new();
            board.refresh(&api).await?;
            print_board(&board);
        }
        Command::Template { campuses, courses } => {
            let path = export::write_upload_template(&config.out_dir, &campuses, &courses).await?;
            println!("Template written to {}", path.display());
        }
        Command::Preview { file, campus_id } => {
            let upload = FileUpload::read(&file).await.map_err(WorkflowError::Intake)?;
            let mut workflow = UploadWorkflow::new(&api, settings);
            workflow.intake(upload)?;
            let report = workflow.validate(&Id::from(campus_id)).await?;
            print_preview(report);
        }
        Command::Create {
            file,
            name,
            campus_ids,
            course_ids,
        } => {
            let draft = BatchDraft {
                name,
                campus_ids: campus_ids.into_iter().map(Id::from).collect(),
                course_ids: course_ids.into_iter().map(Id::from).collect(),
            };
            draft.check()?;
            create_batch(&api, settings, &config, &file, &draft).await?;
        }
        Command::Rename { id, name } => {
            let mut board = BatchBoard::new();
            board.rename(&api, &Id::from(id), &name).await?;
            println!("Batch renamed to \"{}\"", name.trim());
        }
        Command::Delete { id } => {
            let mut board = BatchBoard::new();
            board.delete(&api, &Id::from(id.as_str())).await?;
            println!("Batch {} deleted", id);
        }
    }
    Ok(())
}

async fn create_batch<A: BatchApi>(
    api: &A,
    settings: Settings,
    config: &Config,
    file: &std::path::Path,
    draft: &BatchDraft,
) -> Result<()> {
    let upload = FileUpload::read(file).await.map_err(WorkflowError::Intake)?;
    let mut workflow = UploadWorkflow::new(api, settings);
    workflow.intake(upload)?;

    // The validation endpoint checks a roster against one campus at a time.
    let report = workflow.validate(&draft.campus_ids[0]).await?;
    print_preview(report);

    match workflow.commit(draft).await {
        Ok(report) => {
            println!("{}", report.message);
            if report.kind == CommitKind::Partial && !report.failures.is_empty() {
                println!("Some students could not be created:\n{}", report.failures);
            }
        }
        Err(WorkflowError::Commit(CommitError::Rejected { message, failures })) => {
            if !failures.is_empty() {
                eprintln!("{}", failures);
            }
            bail!(message);
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(count) = workflow.credentials().map(|s| s.len()) {
        eprintln!("{}", ONE_TIME_WARNING);
        match workflow.export_credentials(&config.out_dir).await {
            Ok(path) => println!("{} credentials written to {}", count, path.display()),
            Err(e) => {
                // Last chance to see them: print the CSV instead.
                error!("{}", e);
                eprintln!("Credentials could not be saved, printing them below instead.");
                if let Some(sheet) = workflow.credentials() {
                    let bytes = sheet.to_csv()?;
                    std::io::stdout()
                        .write_all(&bytes)
                        .context("credentials could not be printed")?;
                }
                workflow.mark_exported();
            }
        }
    }
    workflow.close()?;

    let mut board = BatchBoard::new();
    if board.refresh(api).await.is_ok() {
        print_board(&board);
    }
    Ok(())
}

fn print_preview(report: &ValidationReport) {
    println!("{}", report.summary());
    for row in report.flagged() {
        let line = row
            .row
            .map(|n| format!("Row {}", n))
            .unwrap_or_else(|| "Row ?".to_string());
        println!("  {}: {}", line, row.errors.join("; "));
    }
}

fn print_board(board: &BatchBoard) {
    for batch in board.batches() {
        println!(
            "{}\t{}\t{} students",
            batch.id, batch.name, batch.student_count
        );
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, PasswordDisplayMode};
use log::debug;
use std::{path::PathBuf, str::FromStr};
use tokio::{sync::mpsc, task::JoinHandle};
use unitlab_client::{
    AnnotationType, Client, Credentials, DownloadType, Error, Progress, Project, UploadOptions,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Unitlab command line client", long_about = None)]
struct Args {
    /// Unitlab API key
    #[clap(long, env = "UNITLAB_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Unitlab API URL
    #[clap(long, env = "UNITLAB_API_URL", global = true)]
    api_url: Option<String>,

    /// Print raw JSON instead of tables
    #[clap(long, global = true)]
    json: bool,

    /// Client Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Store the API key and URL in ~/.unitlab/credentials.  Prompts for the
    /// API key when --api-key is not given.
    Configure,
    /// Project commands
    Project {
        #[command(subcommand)]
        cmd: ProjectCommand,
    },
    /// Dataset commands
    Dataset {
        #[command(subcommand)]
        cmd: DatasetCommand,
    },
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum ProjectCommand {
    /// List all projects available to the API key.
    List,
    /// Show a single project.
    Detail {
        /// Project ID
        project_id: String,
    },
    /// List the members of a project with their labeling statistics.
    Members {
        /// Project ID
        project_id: String,
    },
    /// Upload every accepted file of a directory to a project.
    Upload {
        /// Project ID
        project_id: String,

        /// Directory containing the data to be uploaded
        #[clap(long)]
        directory: PathBuf,

        /// Number of files per batch
        #[clap(long, default_value_t = 100)]
        batch_size: usize,

        /// Sentences per chunk for text projects
        #[clap(long, default_value_t = 10)]
        sentences_per_chunk: u32,

        /// Frames per second for video projects
        #[clap(long, default_value_t = 1.0)]
        fps: f64,
    },
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum DatasetCommand {
    /// List all datasets available to the API key.
    List,
    /// Create a dataset from a COCO annotation file and upload its images.
    Upload {
        /// Name of the dataset
        #[clap(long)]
        name: String,

        /// Annotation type (img_bbox, img_polygon, img_semantic_segmentation,
        /// img_instance_segmentation, img_line, img_point)
        #[clap(long, value_parser = parse_annotation_type)]
        annotation_type: AnnotationType,

        /// Path to the COCO json file
        #[clap(long)]
        annotation_path: PathBuf,

        /// Directory containing the images
        #[clap(long)]
        data_path: PathBuf,

        /// Number of images per batch
        #[clap(long, default_value_t = 100)]
        batch_size: usize,
    },
    /// Download a dataset export or the dataset files.
    Download {
        /// Dataset ID
        dataset_id: String,

        /// Download type (annotation, files)
        #[clap(long, default_value = "annotation", value_parser = parse_download_type)]
        download_type: DownloadType,

        /// Export type (COCO, YOLOv8, YOLOv5)
        #[clap(long, default_value = "COCO")]
        export_type: String,

        /// Split of the export, for example train or val
        #[clap(long)]
        split_type: Option<String>,

        /// Output directory
        #[clap(long, default_value = ".")]
        output: PathBuf,
    },
}

fn parse_annotation_type(s: &str) -> Result<AnnotationType, String> {
    AnnotationType::from_str(s).map_err(|e| e.to_string())
}

fn parse_download_type(s: &str) -> Result<DownloadType, String> {
    DownloadType::from_str(s).map_err(|e| e.to_string())
}

/// Seconds as `H:MM:SS`.
fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).round() as u64
    } else {
        0
    };
    format!(
        "{}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn format_date(date: Option<&DateTime<Utc>>) -> String {
    date.map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn display<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

fn projects_table(projects: &[Project]) -> Table {
    let mut table = new_table(vec![
        "Project ID",
        "Name",
        "Type",
        "Annotation Type",
        "# of Data",
        "Annotator Progress(%)",
        "Reviewer Progress(%)",
        "Creator",
        "Created Date",
    ]);

    for project in projects {
        table.add_row(vec![
            project.id().to_string(),
            project.name().to_string(),
            display(project.generic_type()),
            display(project.annotation_type()),
            display(project.data_count()),
            display(project.annotator_progress()),
            display(project.reviewer_progress()),
            display(project.creator()),
            format_date(project.created()),
        ]);
    }

    table
}

/// Progress bar fed from the returned channel.  The task ends and the bar
/// finishes once every sender is dropped.
fn progress_bar(message: &'static str) -> (mpsc::Sender<Progress>, JoinHandle<()>) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar.set_message(message);

    let (tx, mut rx) = mpsc::channel::<Progress>(1);

    let handle = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if progress.total > 0 {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.current as u64);
            }
        }
        bar.finish();
    });

    (tx, handle)
}

fn handle_configure(
    client: &Client,
    api_key: Option<String>,
    api_url: Option<String>,
) -> Result<(), Error> {
    let api_key = match api_key {
        Some(api_key) => api_key,
        None => Password::new("Unitlab API key")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .map_err(|e| Error::InvalidParameters(format!("No API key entered: {}", e)))?,
    };

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(Error::InvalidParameters(
            "API key must not be empty".to_string(),
        ));
    }

    client.store_credentials(&Credentials {
        api_key: Some(api_key),
        api_url,
    })?;

    println!("Credentials saved");
    Ok(())
}

async fn handle_project_list(client: &Client, json: bool) -> Result<(), Error> {
    let projects = client.projects().await?;
    if json {
        return print_json(&projects);
    }
    println!("{}", projects_table(&projects));
    Ok(())
}

async fn handle_project_detail(
    client: &Client,
    project_id: String,
    json: bool,
) -> Result<(), Error> {
    let project = client.project(project_id.try_into()?).await?;
    if json {
        return print_json(&project);
    }
    println!("{}", projects_table(std::slice::from_ref(&project)));
    Ok(())
}

async fn handle_project_members(
    client: &Client,
    project_id: String,
    json: bool,
) -> Result<(), Error> {
    let members = client.project_members(project_id.try_into()?).await?;
    if json {
        return print_json(&members);
    }

    let mut table = new_table(vec![
        "Member ID",
        "Member Email",
        "Role",
        "Progress(%)",
        "Average Time",
        "Overall Time",
    ]);
    for member in &members {
        let worker = member.worker();
        table.add_row(vec![
            display(worker.id()),
            worker.email().to_string(),
            display(worker.role()),
            member.progress().to_string(),
            format_duration(member.average_time()),
            format_duration(member.overall_time()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

async fn handle_project_upload(
    client: &Client,
    project_id: String,
    directory: PathBuf,
    options: UploadOptions,
    json: bool,
) -> Result<(), Error> {
    let (tx, bar) = progress_bar("Uploading");
    let summary = client
        .project_upload_data(project_id.try_into()?, &directory, &options, Some(tx))
        .await?;
    bar.await?;

    if json {
        return print_json(&summary);
    }
    println!("{}", summary);
    Ok(())
}

async fn handle_dataset_list(client: &Client, json: bool) -> Result<(), Error> {
    let datasets = client.datasets().await?;
    if json {
        return print_json(&datasets);
    }

    let mut table = new_table(vec![
        "Dataset ID",
        "Name",
        "Annotation Type",
        "# of Data",
        "Created Date",
    ]);
    for dataset in &datasets {
        table.add_row(vec![
            dataset.id().to_string(),
            dataset.name().to_string(),
            display(dataset.annotation_type()),
            display(dataset.data_count()),
            format_date(dataset.created()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

async fn handle_dataset_upload(
    client: &Client,
    name: String,
    annotation_type: AnnotationType,
    annotation_path: PathBuf,
    data_path: PathBuf,
    batch_size: usize,
    json: bool,
) -> Result<(), Error> {
    let (tx, bar) = progress_bar("Uploading");
    let summary = client
        .dataset_upload(
            &name,
            annotation_type,
            &annotation_path,
            &data_path,
            batch_size,
            Some(tx),
        )
        .await?;
    bar.await?;

    if json {
        return print_json(&summary);
    }
    println!("{}", summary);
    Ok(())
}

async fn handle_dataset_download(
    client: &Client,
    dataset_id: String,
    download_type: DownloadType,
    export_type: String,
    split_type: Option<String>,
    output: PathBuf,
    json: bool,
) -> Result<(), Error> {
    let dataset_id = dataset_id.try_into()?;

    match download_type {
        DownloadType::Annotation => {
            if export_type.trim().is_empty() {
                return Err(Error::InvalidParameters(
                    "Export type is required when download type is annotation".to_string(),
                ));
            }
            let path = client
                .dataset_download(dataset_id, &export_type, split_type.as_deref(), &output)
                .await?;
            if json {
                return print_json(&serde_json::json!({ "file": path }));
            }
            println!("{}", path.display());
        }
        DownloadType::Files => {
            let (tx, bar) = progress_bar("Downloading");
            let summary = client
                .dataset_download_files(dataset_id, &output, Some(tx))
                .await?;
            bar.await?;

            if json {
                return print_json(&summary);
            }
            println!("{}", summary);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let client = Client::new()?;
    let client = match &args.api_url {
        Some(api_url) => client.with_api_url(api_url)?,
        None => client,
    };
    let client = match &args.api_key {
        Some(api_key) => client.with_api_key(api_key),
        None => client,
    };
    debug!("{:?}", client);

    let json = args.json;
    match args.cmd {
        Command::Configure => handle_configure(&client, args.api_key, args.api_url),
        Command::Project { cmd } => match cmd {
            ProjectCommand::List => handle_project_list(&client, json).await,
            ProjectCommand::Detail { project_id } => {
                handle_project_detail(&client, project_id, json).await
            }
            ProjectCommand::Members { project_id } => {
                handle_project_members(&client, project_id, json).await
            }
            ProjectCommand::Upload {
                project_id,
                directory,
                batch_size,
                sentences_per_chunk,
                fps,
            } => {
                let options = UploadOptions {
                    batch_size,
                    sentences_per_chunk,
                    fps,
                };
                handle_project_upload(&client, project_id, directory, options, json).await
            }
        },
        Command::Dataset { cmd } => match cmd {
            DatasetCommand::List => handle_dataset_list(&client, json).await,
            DatasetCommand::Upload {
                name,
                annotation_type,
                annotation_path,
                data_path,
                batch_size,
            } => {
                handle_dataset_upload(
                    &client,
                    name,
                    annotation_type,
                    annotation_path,
                    data_path,
                    batch_size,
                    json,
                )
                .await
            }
            DatasetCommand::Download {
                dataset_id,
                download_type,
                export_type,
                split_type,
                output,
            } => {
                handle_dataset_download(
                    &client,
                    dataset_id,
                    download_type,
                    export_type,
                    split_type,
                    output,
                    json,
                )
                .await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(59.6), "0:01:00");
        assert_eq!(format_duration(3661.0), "1:01:01");
        assert_eq!(format_duration(90000.0), "25:00:00");
        assert_eq!(format_duration(-5.0), "0:00:00");
        assert_eq!(format_duration(f64::NAN), "0:00:00");
    }

    #[test]
    fn test_parse_arguments() {
        let args = Args::try_parse_from([
            "unitlab",
            "dataset",
            "download",
            "5d1f7a0e-8c2b-4f39-a6e4-2b9c0d3e4f51",
            "--download-type",
            "files",
            "--json",
        ])
        .unwrap();
        assert!(args.json);
        match args.cmd {
            Command::Dataset {
                cmd:
                    DatasetCommand::Download {
                        download_type,
                        export_type,
                        split_type,
                        ..
                    },
            } => {
                assert_eq!(download_type, DownloadType::Files);
                assert_eq!(export_type, "COCO");
                assert_eq!(split_type, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(
            Args::try_parse_from([
                "unitlab",
                "dataset",
                "upload",
                "--name",
                "x",
                "--annotation-type",
                "img_skeleton",
                "--annotation-path",
                "a.json",
                "--data-path",
                "images",
            ])
            .is_err()
        );
    }
}

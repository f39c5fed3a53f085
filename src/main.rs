use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use study_core::config::{optional_path_from_env_value, study_data_dir_from_env_value};
use study_core::value_objects::{StudyDescription, StudyIdentificationMetadata};
use study_core::{
    CoreConfig, FileStudyRepository, NewStudyValues, StudyDefinition, StudyMetadataSnapshot,
    StudyService,
};
use study_types::NonEmptyText;

/// Command line front end for study definitions.
///
/// # Environment Variables
/// - `STUDY_DATA_DIR`: Directory for study data storage (default: "study_data")
/// - `STUDY_REFERENCE_DATA`: YAML reference-data catalogue (optional)
/// - `STUDY_FIELD_CONFIG`: YAML field configuration table (optional)
/// - `RUST_LOG`: Log filter (default adds "study=info")
#[derive(Parser)]
#[command(name = "study", version, about = "Manage study definitions")]
struct Cli {
    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new draft study
    Create(CreateArgs),
    /// Show a study's current metadata
    Show { uid: String },
    /// List all stored studies
    List,
    /// Edit fields of a draft study
    Edit {
        uid: String,
        /// Field assignment NAME=VALUE; VALUE is read as JSON, falling back to a string
        #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
        assignments: Vec<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Release the current draft
    Release {
        uid: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Lock the current draft as a new version
    Lock {
        uid: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        author: String,
    },
    /// Reopen a locked study for editing
    Unlock {
        uid: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Delete a study that has never been locked
    Delete { uid: String },
    /// List the lifecycle actions currently allowed
    Actions { uid: String },
    /// Show locked versions, or one of them with --version
    Versions {
        uid: String,
        #[arg(long)]
        version: Option<usize>,
    },
    /// Show the current metadata grouped by value object
    Fields { uid: String },
    /// Print the active field configuration as YAML
    FieldConfig,
}

/// Study id prefix always follows the project number.
#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    number: Option<String>,
    #[arg(long)]
    acronym: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    short_title: Option<String>,
    /// Uid of the parent study when creating a sub-part
    #[arg(long)]
    parent: Option<String>,
    #[arg(long)]
    author: Option<String>,
}

impl CreateArgs {
    fn into_values(self) -> (NewStudyValues, Option<String>) {
        let values = NewStudyValues {
            identification: StudyIdentificationMetadata::builder()
                .study_number(self.number)
                .study_acronym(self.acronym)
                .project_number(self.project)
                .build(),
            description: StudyDescription::builder()
                .study_title(self.title)
                .study_short_title(self.short_title)
                .build(),
            study_parent_part_uid: self.parent,
            ..Default::default()
        };
        (values, self.author)
    }
}

#[derive(Serialize)]
struct StudySummary {
    uid: String,
    study_id: Option<String>,
    study_number: Option<String>,
    study_acronym: Option<String>,
    study_title: Option<String>,
    status: String,
    version_number: Option<String>,
    version_timestamp: String,
}

impl From<&StudyDefinition> for StudySummary {
    fn from(study: &StudyDefinition) -> Self {
        let current = study.current_metadata();
        let id = current.identification();
        Self {
            uid: study.uid().to_owned(),
            study_id: id.study_id(),
            study_number: id.study_number().clone(),
            study_acronym: id.study_acronym().clone(),
            study_title: current.description().study_title().clone(),
            status: study.study_status().to_string(),
            version_number: current.version().version_number().map(|v| v.to_string()),
            version_timestamp: current.version().timestamp().to_rfc3339(),
        }
    }
}

/// Main entry point for the study command line tool.
///
/// Resolves configuration from the environment (after loading `.env`), builds a file-backed
/// [`StudyService`] and runs one subcommand against it.
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("study=info".parse()?)
                .add_directive("study_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = Arc::new(config_from_env()?);
    tracing::debug!("using study data directory {}", cfg.study_data_dir().display());
    let service = StudyService::from_config(cfg)?;

    run(&service, cli.command, cli.json)
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let study_data_dir = study_data_dir_from_env_value(std::env::var("STUDY_DATA_DIR").ok());
    let reference_data = optional_path_from_env_value(std::env::var("STUDY_REFERENCE_DATA").ok());
    let field_config = optional_path_from_env_value(std::env::var("STUDY_FIELD_CONFIG").ok());

    CoreConfig::new(study_data_dir, reference_data, field_config)
        .context("invalid study configuration")
}

fn run(
    service: &StudyService<FileStudyRepository>,
    command: Command,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => {
            let (values, author) = args.into_values();
            let author = parse_author(author)?;
            let study = service.create(values, author.as_ref().map(NonEmptyText::as_str))?;
            print_study(&study, json)
        }
        Command::Show { uid } => {
            let study = service.get(&uid)?;
            if json {
                print_json(&study.get_snapshot())
            } else {
                print_study(&study, false)
            }
        }
        Command::List => {
            let studies = service.list()?;
            let summaries: Vec<StudySummary> = studies.iter().map(StudySummary::from).collect();
            if json {
                return print_json(&summaries);
            }
            for s in summaries {
                println!(
                    "{}  {:<8}  {:<10}  {}",
                    s.uid,
                    s.status,
                    s.study_id.or(s.study_number).unwrap_or_else(|| "-".into()),
                    s.study_title.or(s.study_acronym).unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Edit {
            uid,
            assignments,
            author,
        } => {
            let assignments = parse_assignments(&assignments)?;
            let author = parse_author(author)?;
            let study = service.edit_fields(
                &uid,
                &assignments,
                author.as_ref().map(NonEmptyText::as_str),
            )?;
            print_study(&study, json)
        }
        Command::Release {
            uid,
            description,
            author,
        } => {
            let author = parse_author(author)?;
            let study = service.release(
                &uid,
                description.as_deref(),
                author.as_ref().map(NonEmptyText::as_str),
            )?;
            print_study(&study, json)
        }
        Command::Lock {
            uid,
            description,
            author,
        } => {
            let author = NonEmptyText::new(author).context("author cannot be blank")?;
            let study = service.lock(&uid, &description, author.as_str())?;
            print_study(&study, json)
        }
        Command::Unlock { uid, author } => {
            let author = parse_author(author)?;
            let study = service.unlock(&uid, author.as_ref().map(NonEmptyText::as_str))?;
            print_study(&study, json)
        }
        Command::Delete { uid } => {
            let study = service.delete(&uid)?;
            print_study(&study, json)
        }
        Command::Actions { uid } => {
            let actions = service.possible_actions(&uid)?;
            if json {
                return print_json(&actions);
            }
            for action in actions {
                println!("{action}");
            }
            Ok(())
        }
        Command::Versions { uid, version } => match version {
            Some(k) => {
                let metadata = service.locked_version(&uid, k)?;
                print_json(&StudyMetadataSnapshot::from_metadata(&metadata))
            }
            None => {
                let study = service.get(&uid)?;
                let versions = study.get_all_locked_versions();
                if json {
                    let records: Vec<StudyMetadataSnapshot> = versions
                        .iter()
                        .map(StudyMetadataSnapshot::from_metadata)
                        .collect();
                    return print_json(&records);
                }
                for (i, v) in versions.iter().enumerate() {
                    let ver = v.version();
                    println!(
                        "{}  {}  {}  {}",
                        i + 1,
                        ver.timestamp().to_rfc3339(),
                        ver.author().unwrap_or("-"),
                        ver.description().unwrap_or_default()
                    );
                }
                Ok(())
            }
        },
        Command::Fields { uid } => {
            let groups = service.field_view(&uid)?;
            if json {
                let object: Map<String, Value> = groups
                    .into_iter()
                    .map(|g| (g.grouping, Value::Object(g.fields.into_iter().collect())))
                    .collect();
                return print_json(&object);
            }
            for group in groups {
                println!("[{}] {}", group.grouping, group.value_object_class);
                for (name, value) in group.fields.iter().filter(|(_, v)| !v.is_null()) {
                    println!("  {name} = {value}");
                }
            }
            Ok(())
        }
        Command::FieldConfig => {
            print!("{}", service.field_configuration().render()?);
            Ok(())
        }
    }
}

fn parse_author(author: Option<String>) -> anyhow::Result<Option<NonEmptyText>> {
    author
        .map(NonEmptyText::new)
        .transpose()
        .context("author cannot be blank")
}

/// Parses `NAME=VALUE` pairs; values that are not valid JSON are taken as strings.
fn parse_assignments(raw: &[String]) -> anyhow::Result<Map<String, Value>> {
    raw.iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got {pair:?}"))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.into()));
            Ok((name.trim().to_owned(), value))
        })
        .collect()
}

fn print_study(study: &StudyDefinition, json: bool) -> anyhow::Result<()> {
    let summary = StudySummary::from(study);
    if json {
        return print_json(&summary);
    }

    println!("uid:      {}", summary.uid);
    println!("status:   {}", summary.status);
    if let Some(id) = &summary.study_id {
        println!("study id: {id}");
    }
    if let Some(acronym) = &summary.study_acronym {
        println!("acronym:  {acronym}");
    }
    if let Some(title) = &summary.study_title {
        println!("title:    {title}");
    }
    if let Some(version) = &summary.version_number {
        println!("version:  {version}");
    }
    println!("updated:  {}", summary.version_timestamp);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

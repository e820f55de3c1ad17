use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::*;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use witai::{
    api::{
        AppUpdate, EntityDefinition, Keyword, Lookup, MessageOptions, NewApp, Page,
        SynthesizeOptions, Utterance,
    },
    corpus::DEFAULT_DATASET,
    training::{TrainingError, TrainingReport},
    delete_all_utterances, Corpus, Pacing, Trainer, WitClient, WitConfig,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get the meaning of a sentence
    Message {
        text: String,
        #[arg(long)]
        tag: Option<String>,
        /// Number of intents to return
        #[arg(short)]
        n: Option<u32>,
        /// Context object as JSON
        #[arg(long, value_parser = parse_json)]
        context: Option<Value>,
        /// Dynamic entities as JSON
        #[arg(long, value_parser = parse_json)]
        entities: Option<Value>,
    },
    /// Transcribe an audio file
    Transcribe {
        file: PathBuf,
        #[arg(long, default_value = "audio/wav")]
        content_type: String,
    },
    /// Get the meaning of an audio file
    Speech {
        file: PathBuf,
        #[arg(long, default_value = "audio/wav")]
        content_type: String,
        #[arg(long, value_parser = parse_json)]
        context: Option<Value>,
    },
    /// Synthesize speech and write the audio to a file
    Synthesize {
        text: String,
        #[arg(long, default_value = "wit$Rebecca")]
        voice: String,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        speed: Option<u32>,
        #[arg(long)]
        pitch: Option<u32>,
        /// Audio format requested through the Accept header
        #[arg(long)]
        accept: Option<String>,
        #[arg(long, short, default_value = "output.raw")]
        out: PathBuf,
    },
    /// Detect the language of a text
    Language {
        text: String,
        #[arg(short)]
        n: Option<u32>,
    },
    /// Manage intents
    #[command(subcommand)]
    Intents(IntentCommand),
    /// Manage entities and their keywords
    #[command(subcommand)]
    Entities(EntityCommand),
    /// Manage apps
    #[command(subcommand)]
    Apps(AppCommand),
    /// Manage training utterances
    #[command(subcommand)]
    Utterances(UtteranceCommand),
    /// Delete all utterances and intents, then retrain from a dataset
    Train {
        #[arg(default_value = DEFAULT_DATASET)]
        dataset: PathBuf,
        #[arg(long, default_value_t = witai::training::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Pause between intent deletions and creations
        #[arg(long, default_value_t = 1)]
        intent_delay_secs: u64,
        /// Pause between utterance batches
        #[arg(long, default_value_t = 2)]
        batch_delay_secs: u64,
    },
}

#[derive(Subcommand)]
enum IntentCommand {
    List,
    Create { name: String },
    Get { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum EntityCommand {
    List,
    Create {
        name: String,
        #[command(flatten)]
        definition: EntityArgs,
    },
    Get {
        name: String,
    },
    /// Replace an entity's definition
    Update {
        entity: String,
        /// New name, defaults to the current one
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        definition: EntityArgs,
    },
    Delete {
        name: String,
    },
    AddKeyword {
        entity: String,
        keyword: String,
        #[arg(long = "synonym")]
        synonyms: Vec<String>,
    },
    DeleteKeyword {
        entity: String,
        keyword: String,
    },
}

#[derive(Args)]
struct EntityArgs {
    #[arg(long = "role")]
    roles: Vec<String>,
    #[arg(long = "lookup", value_enum)]
    lookups: Vec<LookupArg>,
    /// `keyword=synonym,synonym`
    #[arg(long = "keyword", value_parser = parse_keyword)]
    keywords: Vec<Keyword>,
}

impl EntityArgs {
    fn into_definition(self, name: String) -> EntityDefinition {
        EntityDefinition {
            name,
            roles: self.roles,
            lookups: self.lookups.into_iter().map(Lookup::from).collect(),
            keywords: self.keywords,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LookupArg {
    FreeText,
    Keywords,
}

impl From<LookupArg> for Lookup {
    fn from(arg: LookupArg) -> Self {
        match arg {
            LookupArg::FreeText => Lookup::FreeText,
            LookupArg::Keywords => Lookup::Keywords,
        }
    }
}

#[derive(Subcommand)]
enum AppCommand {
    List {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    Create {
        name: String,
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long)]
        private: bool,
        #[arg(long)]
        timezone: Option<String>,
    },
    Get {
        app_id: String,
    },
    Update {
        app_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        private: Option<bool>,
        #[arg(long)]
        timezone: Option<String>,
    },
    Delete {
        app_id: String,
    },
}

#[derive(Subcommand)]
enum UtteranceCommand {
    List {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long = "intent")]
        intents: Vec<String>,
    },
    /// Upload a JSON array of utterances
    Upload { file: PathBuf },
    /// Delete every stored utterance
    DeleteAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if dotenv::dotenv().is_err() {
        warn!("didn't load a .env file")
    }

    let args = Cli::parse();

    let config = WitConfig::from_env().context("failed to load wit.ai configuration")?;
    let client = WitClient::new(config).context("failed to create wit.ai client")?;

    match args.command {
        Commands::Message {
            text,
            tag,
            n,
            context,
            entities,
        } => {
            let options = MessageOptions {
                tag,
                n,
                context,
                entities,
            };
            print_json(&client.message(&text, &options).await?)?;
        }
        Commands::Transcribe { file, content_type } => {
            print_json(&client.transcribe(&file, &content_type).await?)?;
        }
        Commands::Speech {
            file,
            content_type,
            context,
        } => {
            print_json(
                &client
                    .speech(&file, &content_type, context.as_ref())
                    .await?,
            )?;
        }
        Commands::Synthesize {
            text,
            voice,
            style,
            speed,
            pitch,
            accept,
            out,
        } => {
            let options = SynthesizeOptions {
                style,
                speed,
                pitch,
                accept,
            };
            let audio = client.synthesize(&text, &voice, &options).await?;
            std::fs::write(&out, audio)
                .with_context(|| format!("failed to write audio to {}", out.display()))?;
            println!("Audio saved to {}", out.display());
        }
        Commands::Language { text, n } => {
            print_json(&client.detect_language(&text, n).await?)?;
        }
        Commands::Intents(command) => run_intents(&client, command).await?,
        Commands::Entities(command) => run_entities(&client, command).await?,
        Commands::Apps(command) => run_apps(&client, command).await?,
        Commands::Utterances(command) => run_utterances(&client, command).await?,
        Commands::Train {
            dataset,
            batch_size,
            intent_delay_secs,
            batch_delay_secs,
        } => {
            let corpus = Corpus::load(&dataset)
                .with_context(|| format!("failed to load dataset {}", dataset.display()))?;
            let trainer = Trainer::new()
                .batch_size(batch_size)
                .intent_pacing(pacing(intent_delay_secs))
                .batch_pacing(pacing(batch_delay_secs));

            println!("Training with {} utterances...", corpus.len());
            match trainer.run(&client, &corpus).await {
                Ok(report) => print_report(&report),
                Err(aborted) => {
                    print_report(&aborted.report);
                    return Err(anyhow::Error::new(aborted.cause).context("training aborted"));
                }
            }
            println!("Training completed!");
        }
    }

    Ok(())
}

async fn run_intents(client: &WitClient, command: IntentCommand) -> Result<()> {
    match command {
        IntentCommand::List => print_json(&client.list_intents().await?),
        IntentCommand::Create { name } => print_json(&client.create_intent(&name).await?),
        IntentCommand::Get { name } => print_json(&client.get_intent(&name).await?),
        IntentCommand::Delete { name } => print_json(&client.delete_intent(&name).await?),
    }
}

async fn run_entities(client: &WitClient, command: EntityCommand) -> Result<()> {
    match command {
        EntityCommand::List => print_json(&client.list_entities().await?),
        EntityCommand::Create { name, definition } => {
            print_json(&client.create_entity(&definition.into_definition(name)).await?)
        }
        EntityCommand::Get { name } => print_json(&client.get_entity(&name).await?),
        EntityCommand::Update {
            entity,
            name,
            definition,
        } => {
            let definition = definition.into_definition(name.unwrap_or_else(|| entity.clone()));
            print_json(&client.update_entity(&entity, &definition).await?)
        }
        EntityCommand::Delete { name } => print_json(&client.delete_entity(&name).await?),
        EntityCommand::AddKeyword {
            entity,
            keyword,
            synonyms,
        } => print_json(
            &client
                .add_keyword(&entity, &Keyword::new(keyword, synonyms))
                .await?,
        ),
        EntityCommand::DeleteKeyword { entity, keyword } => {
            print_json(&client.delete_keyword(&entity, &keyword).await?)
        }
    }
}

async fn run_apps(client: &WitClient, command: AppCommand) -> Result<()> {
    match command {
        AppCommand::List { limit, offset } => {
            print_json(&client.list_apps(Page { limit, offset }).await?)
        }
        AppCommand::Create {
            name,
            lang,
            private,
            timezone,
        } => {
            let app = NewApp {
                name,
                lang,
                private,
                timezone,
            };
            print_json(&client.create_app(&app).await?)
        }
        AppCommand::Get { app_id } => print_json(&client.get_app(&app_id).await?),
        AppCommand::Update {
            app_id,
            name,
            lang,
            private,
            timezone,
        } => {
            let update = AppUpdate {
                name,
                lang,
                private,
                timezone,
            };
            print_json(&client.update_app(&app_id, &update).await?)
        }
        AppCommand::Delete { app_id } => print_json(&client.delete_app(&app_id).await?),
    }
}

async fn run_utterances(client: &WitClient, command: UtteranceCommand) -> Result<()> {
    match command {
        UtteranceCommand::List {
            limit,
            offset,
            intents,
        } => {
            let stored = client
                .list_utterances(Page { limit, offset }, &intents)
                .await?;
            for utterance in stored {
                let intent = utterance.intent.map(|intent| intent.name).unwrap_or_default();
                println!("{}\t{}", intent, utterance.text);
            }
            Ok(())
        }
        UtteranceCommand::Upload { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let utterances: Vec<Utterance> =
                serde_json::from_str(&json).context("expected a JSON array of utterances")?;
            print_json(&client.upload_utterances(&utterances).await?)
        }
        UtteranceCommand::DeleteAll => {
            let result = delete_all_utterances(client).await?;
            println!("Deleted utterances: {}", result.n);
            Ok(())
        }
    }
}

fn print_report(report: &TrainingReport) {
    println!(
        "Deleted {} utterances and {} intents",
        report.utterances_purged,
        report.intents_deleted.len()
    );
    println!(
        "Created {} intents, {} already existed",
        report.intents_created.len(),
        report.intents_existing.len()
    );
    println!(
        "Uploaded {} utterances in {} batches",
        report.utterances_uploaded(),
        report.batches_uploaded.len()
    );
    for failure in &report.failures {
        println!("Skipped: {}", failure_summary(failure));
    }
}

fn failure_summary(failure: &TrainingError) -> String {
    match std::error::Error::source(failure) {
        Some(cause) => format!("{failure}: {cause}"),
        None => failure.to_string(),
    }
}

fn pacing(secs: u64) -> Pacing {
    if secs == 0 {
        Pacing::None
    } else {
        Pacing::Fixed(Duration::from_secs(secs))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

fn parse_keyword(s: &str) -> Result<Keyword, String> {
    let (keyword, synonyms) = s.split_once('=').unwrap_or((s, ""));
    if keyword.is_empty() {
        return Err("keyword must not be empty".into());
    }
    Ok(Keyword::new(
        keyword,
        synonyms.split(',').map(str::trim).filter(|s| !s.is_empty()),
    ))
}

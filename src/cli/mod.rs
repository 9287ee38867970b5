use std::path::{Path, PathBuf};

use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::{
    configuration::Configuration,
    database::{setup_database, DocumentCollection},
    error::{CorsiError, CorsiResult},
    web::moduli::CreateModuloRequest,
    web::run_web_api,
    web::studenti::CreateStudenteRequest,
};

/// CLI of the course management backend.
#[derive(Parser, Debug, Default)]
enum Cli {
    /// Run the web API (default).
    #[default]
    Web,

    /// Replace the contents of both collections with seed data read from
    /// JSON files. The records go through the same validation as the HTTP
    /// create endpoints.
    ///
    /// **WARNING:** This wipes the current students and modules first.
    Seed {
        /// JSON file with an array of students.
        #[arg(long)]
        studenti: PathBuf,
        /// JSON file with an array of modules.
        #[arg(long)]
        moduli: PathBuf,
    },
}

#[instrument(skip(configuration))]
pub async fn run_cli_command(configuration: &Configuration) -> CorsiResult<()> {
    let cli_command = Cli::parse();
    debug!("Cli arguments: {cli_command:#?}");

    match cli_command {
        Cli::Web => run_web_backend(configuration).await?,
        Cli::Seed { studenti, moduli } => seed_collections(configuration, &studenti, &moduli).await?,
    }

    Ok(())
}

#[instrument(err, skip(configuration))]
async fn run_web_backend(configuration: &Configuration) -> CorsiResult<()> {
    debug!("Running corsi backend with configuration: {configuration:#?}");

    let database = setup_database(configuration).await?;

    run_web_api(database, configuration).await
}

#[instrument(err, skip(configuration))]
async fn seed_collections(
    configuration: &Configuration,
    studenti_path: &Path,
    moduli_path: &Path,
) -> CorsiResult<()> {
    let moduli_seed: Vec<CreateModuloRequest> = read_seed_file(moduli_path)?;
    let studenti_seed: Vec<CreateStudenteRequest> = read_seed_file(studenti_path)?;

    let database = setup_database(configuration).await?;

    let moduli = DocumentCollection::new(
        &database,
        crate::database::model::moduli::Modulo::COLLECTION,
    );
    moduli.clear().await?;
    let mut moduli_count = 0usize;
    for request in moduli_seed {
        moduli.insert_one(&request.into_modulo()?).await?;
        moduli_count += 1;
    }

    let studenti = DocumentCollection::new(
        &database,
        crate::database::model::studenti::Studente::COLLECTION,
    );
    studenti.clear().await?;
    let mut studenti_count = 0usize;
    for request in studenti_seed {
        studenti.insert_one(&request.into_studente()?).await?;
        studenti_count += 1;
    }

    info!("Loaded {moduli_count} modules and {studenti_count} students");
    Ok(())
}

fn read_seed_file<T: DeserializeOwned>(path: &Path) -> CorsiResult<Vec<T>> {
    let raw = std::fs::read_to_string(path).map_err(|error| CorsiError::SeedData {
        source: Box::new(error),
    })?;
    serde_json::from_str(&raw).map_err(|error| CorsiError::SeedData {
        source: Box::new(error),
    })
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Coda demo: builds a small database, then edits and deletes part of its
//! vocabulary and prints the cells after every cascade.
// The demo reports on stdout.
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coda_config::{ConfigService, FsConfigStore};
use coda_db::{
    ColPred, DataValue, Database, DbConfig, ElementId, MatrixType, MatrixVocabElement, Predicate,
    PredicateVocabElement, SchemaAuthority, Slot, TimeStamp, DB_CONFIG_KEY,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Coda schema-cascade demo")]
struct Args {
    /// Tick rate of timestamp slots (1..=1000); overrides the stored config
    #[arg(long)]
    tps: Option<u32>,
    /// Let records built by the database accept query variables
    #[arg(long)]
    query_vars: bool,
    /// Directory holding `db.json`; defaults are used when omitted
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

struct Schema {
    float_mve: ElementId,
    obs: ElementId,
    trial: ElementId,
}

fn load_config(args: &Args) -> Result<DbConfig> {
    let mut cfg = match &args.config_dir {
        Some(dir) => {
            let store = FsConfigStore::at(dir).context("open config dir")?;
            ConfigService::new(store)
                .load_or_default(DB_CONFIG_KEY)
                .context("load db config")?
        }
        None => DbConfig::default(),
    };
    if let Some(tps) = args.tps {
        cfg.ticks_per_second = tps;
    }
    cfg.allow_query_vars |= args.query_vars;
    Ok(cfg)
}

fn build_schema(db: &mut Database) -> Result<Schema> {
    let float_mve = db.add_matrix_ve(
        MatrixVocabElement::new("float_mve", MatrixType::Float).with_slot(Slot::float("<val>")),
    )?;
    let obs = db.add_predicate_ve(
        PredicateVocabElement::new("obs")
            .with_slot(Slot::nominal("<who>"))
            .with_slot(Slot::float("<score>")),
    )?;
    let trial = db.add_matrix_ve(
        MatrixVocabElement::new("trial", MatrixType::Matrix)
            .with_slot(Slot::untyped("<u>"))
            .with_slot(Slot::col_predicate("<cp>"))
            .with_slot(Slot::predicate("<p>")),
    )?;
    Ok(Schema {
        float_mve,
        obs,
        trial,
    })
}

fn float_reading(db: &Database, mve: ElementId, ord: i64, ticks: i64, val: f64) -> Result<ColPred> {
    let tps = db.config().ticks_per_second;
    let cp = ColPred::construct(
        db.vocab(),
        mve,
        &[
            Some(DataValue::int(ord)),
            Some(DataValue::time_stamp(TimeStamp::new(tps, ticks)?)),
            Some(DataValue::time_stamp(TimeStamp::new(tps, ticks * 60)?)),
            Some(DataValue::float(val)),
        ],
    )?;
    Ok(cp)
}

fn populate(db: &mut Database, schema: &Schema) -> Result<()> {
    let reading = float_reading(db, schema.float_mve, 11, 11, 11.0)?;
    db.insert_cell(reading)?;

    let nested_u = float_reading(db, schema.float_mve, 1, 2, 0.5)?;
    let nested_cp = float_reading(db, schema.float_mve, 2, 3, 1.5)?;
    let who = Predicate::with_args(
        db.vocab(),
        schema.obs,
        vec![DataValue::nominal("alice")?, DataValue::float(2.5)],
    )?;
    let trial = ColPred::construct(
        db.vocab(),
        schema.trial,
        &[
            None,
            None,
            None,
            Some(DataValue::col_predicate(nested_u)),
            Some(DataValue::col_predicate(nested_cp)),
            Some(DataValue::predicate(who)),
        ],
    )?;
    db.insert_cell(trial)?;
    Ok(())
}

fn report(db: &Database, title: &str) {
    println!("== {title}");
    for (cell_id, cp) in db.cells() {
        println!("cell {cell_id}: {cp}");
    }
    println!(
        "index: {} entries, next id {}; vocabulary: {} elements",
        db.index().len(),
        db.index().next_id(),
        db.vocab().len()
    );
}

fn run(db: &mut Database) -> Result<()> {
    let schema = build_schema(db)?;
    populate(db, &schema)?;
    report(db, "initial");
    if let Some((_, first)) = db.cells().next() {
        println!("debug form: {}", first.to_db_string());
    }

    let mut obs = db.vocab().predicate(schema.obs)?.clone();
    obs.slot_mut(1)
        .context("obs has a score slot")?
        .rename("<rating>");
    obs.insert_slot(2, Slot::quote_string("<note>"));
    let change = db.replace_predicate_ve(obs)?;
    info!(slots_changed = change.farg_list_changed, "predicate obs edited");
    report(db, "after renaming and extending obs");

    let mut reading = db.vocab().matrix(schema.float_mve)?.clone();
    reading.rename("reading");
    db.replace_matrix_ve(reading)?;
    report(db, "after renaming float_mve");

    db.delete_matrix_ve(schema.float_mve)?;
    report(db, "after deleting reading");

    db.check_congruence()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = load_config(&args)?;
    info!(?cfg, "starting demo");
    let mut db = Database::new(cfg).context("create database")?;
    run(&mut db)
}

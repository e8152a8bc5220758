use crate::config::{BuildPlan, GeneratorConfig, config_path};
use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::rules::{Rule, RuleCursor};
use crate::table::{DiskHashTable, Insertion, TableLayout, WriteStats};
use crate::utils::progress::{ProgressBar, population_bar};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Emit a debug event every this many generated passwords
const LOG_INTERVAL: u64 = 100_000;

/// Which insertion the populator uses, and when it stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Every rank of the rule, appended without duplicate checks
    Exhaustive,
    /// Duplicate-free inserts; with `stop_at_limit`, stop after `count` of them
    Limited { count: u64, stop_at_limit: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulatorState {
    Running,
    Done,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PopulateReport {
    /// Passwords pulled from the rule
    pub generated: u64,
    pub inserted: u64,
    /// Duplicates rejected by `insert_unique`
    pub skipped: u64,
}

/// Streams a rule's passwords through a digest into a table.
///
/// Single pass, one record per step. Any error ends the run; the table is
/// left to the caller, which should still close it.
pub struct TablePopulator<'a> {
    cursor: RuleCursor<'a>,
    table: &'a mut DiskHashTable,
    digest: DigestAlgorithm,
    mode: GenerationMode,
    password: Vec<u8>,
    state: PopulatorState,
    report: PopulateReport,
    progress: Option<ProgressBar>,
}

impl<'a> TablePopulator<'a> {
    pub fn new(
        rule: &'a Rule,
        table: &'a mut DiskHashTable,
        digest: DigestAlgorithm,
        mode: GenerationMode,
    ) -> Self {
        Self {
            cursor: rule.cursor(),
            table,
            digest,
            mode,
            password: Vec::with_capacity(rule.max_len()),
            state: PopulatorState::Running,
            report: PopulateReport::default(),
            progress: None,
        }
    }

    /// Show a progress bar over the rule's ranks
    pub fn with_progress(mut self) -> Self {
        self.progress = Some(population_bar(self.cursor.rule().size()));
        self
    }

    /// Process one password.
    ///
    /// Returns `Done` once the rule is exhausted or the limit is reached.
    /// After an error the state is `Done` and further steps do nothing.
    pub fn step(&mut self) -> Result<PopulatorState> {
        if self.state == PopulatorState::Done {
            return Ok(PopulatorState::Done);
        }

        match self.advance() {
            Ok(PopulatorState::Running) => Ok(PopulatorState::Running),
            Ok(PopulatorState::Done) => {
                self.state = PopulatorState::Done;
                if let Some(pb) = &self.progress {
                    pb.finish_with_message(format!("{} records", self.report.inserted));
                }
                Ok(PopulatorState::Done)
            }
            Err(e) => {
                self.state = PopulatorState::Done;
                if let Some(pb) = &self.progress {
                    pb.abandon_with_message("failed");
                }
                Err(e)
            }
        }
    }

    /// Step until `Done`
    pub fn run(&mut self) -> Result<PopulateReport> {
        while self.step()? == PopulatorState::Running {}
        Ok(self.report)
    }

    pub fn state(&self) -> PopulatorState {
        self.state
    }

    pub fn report(&self) -> PopulateReport {
        self.report
    }

    /// Next rank the populator will draw
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn advance(&mut self) -> Result<PopulatorState> {
        if self.limit_reached() {
            return Ok(PopulatorState::Done);
        }
        if self.cursor.next_password(&mut self.password)?.is_none() {
            return Ok(PopulatorState::Done);
        }
        self.report.generated += 1;

        let digest = self.digest.digest(&self.password)?;
        match self.mode {
            GenerationMode::Exhaustive => {
                self.table.append(digest.as_bytes(), &self.password)?;
                self.report.inserted += 1;
            }
            GenerationMode::Limited { .. } => {
                match self.table.insert_unique(digest.as_bytes(), &self.password)? {
                    Insertion::Inserted => self.report.inserted += 1,
                    Insertion::Skipped => self.report.skipped += 1,
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        if self.report.generated % LOG_INTERVAL == 0 {
            debug!(
                generated = self.report.generated,
                inserted = self.report.inserted,
                skipped = self.report.skipped,
                position = self.cursor.position(),
                "populating"
            );
        }

        if self.limit_reached() {
            return Ok(PopulatorState::Done);
        }
        Ok(PopulatorState::Running)
    }

    fn limit_reached(&self) -> bool {
        matches!(
            self.mode,
            GenerationMode::Limited { count, stop_at_limit: true } if self.report.inserted >= count
        )
    }
}

/// Options for [`build_table`]
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Config file; defaults to `<prefix>.json`
    pub config: Option<PathBuf>,
    pub progress: bool,
}

/// What a finished build produced
#[derive(Debug, Clone, Copy)]
pub struct BuildOutcome {
    pub digest: DigestAlgorithm,
    pub layout: TableLayout,
    pub rule_size: u64,
    pub report: PopulateReport,
    pub stats: WriteStats,
}

/// Read the configuration for `prefix`, then create, populate and close
/// its table.
///
/// Once the table files exist, any failure still closes the table, best
/// effort, before the error is returned.
pub fn build_table(prefix: &Path, options: &BuildOptions) -> anyhow::Result<BuildOutcome> {
    let config_file = options.config.clone().unwrap_or_else(|| config_path(prefix));
    let config = GeneratorConfig::load(&config_file)?;
    let base_dir = config_file.parent().unwrap_or(Path::new("."));
    let plan = config
        .plan(base_dir)
        .with_context(|| format!("Invalid configuration in {}", config_file.display()))?;

    info!(
        rule = %plan.rule,
        passwords = plan.rule.size(),
        digest = %plan.digest,
        mode = ?plan.mode,
        "building table"
    );

    let mut table = DiskHashTable::create(prefix, plan.layout, plan.digest, plan.bucket_hash)
        .with_context(|| format!("Failed to create table at {}", prefix.display()))?;
    let report = match populate(&mut table, &plan, options.progress) {
        Ok(report) => report,
        Err(err) => return Err(abandon(table, err)),
    };

    let stats = table.close().context("Failed to close table")?;
    info!(
        generated = report.generated,
        inserted = report.inserted,
        skipped = report.skipped,
        blocks = stats.blocks,
        "table complete"
    );

    Ok(BuildOutcome {
        digest: plan.digest,
        layout: plan.layout,
        rule_size: plan.rule.size(),
        report,
        stats,
    })
}

/// Load the directory cache and run the populator to completion
fn populate(table: &mut DiskHashTable, plan: &BuildPlan, progress: bool) -> anyhow::Result<PopulateReport> {
    table
        .load_directory_cache()
        .context("Failed to load directory cache")?;

    let mut populator = TablePopulator::new(&plan.rule, table, plan.digest, plan.mode);
    if progress {
        populator = populator.with_progress();
    }
    let result = populator.run();
    result.map_err(|err| populate_error(err, populator.report()))
}

/// Close a table whose build failed, keeping the original error
fn abandon(table: DiskHashTable, err: anyhow::Error) -> anyhow::Error {
    if let Err(close_err) = table.close() {
        warn!(error = %close_err, "failed to close table after build error");
    }
    err
}

fn populate_error(err: Error, report: PopulateReport) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(format!(
        "Populating failed after {} passwords ({:?} error)",
        report.generated, kind
    ))
}

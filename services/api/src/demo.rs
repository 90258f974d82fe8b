use crate::infra::{default_badges, sample_hotels, InMemoryStore};
use crate::routes::{preview, ScorePreviewRequest, ScorePreviewResponse};
use crate::server::store_error;
use clap::Args;
use pool_scoring::config::ScoringConfig;
use pool_scoring::error::AppError;
use pool_scoring::scoring::{
    Hotel, PoolCriteria, RunReport, ScoreBreakdown, ScoringService, ScoringWeight,
    WeightSeedImporter,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Pool criteria JSON file
    pub(crate) criteria: PathBuf,
    /// Optional weight seed CSV (criterion,weight,family_weight,quiet_weight,party_weight,is_active)
    #[arg(long)]
    pub(crate) weights: Option<PathBuf>,
    /// Print the breakdown as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional weight seed CSV; defaults to the built-in weights
    #[arg(long)]
    pub(crate) weights: Option<PathBuf>,
    /// Publish run progress every N hotels
    #[arg(long, default_value_t = ScoringConfig::DEFAULT_PROGRESS_INTERVAL)]
    pub(crate) progress_interval: usize,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        criteria,
        weights,
        json,
    } = args;

    let reader = BufReader::new(File::open(&criteria)?);
    let criteria: PoolCriteria = serde_json::from_reader(reader)?;
    let weights = weights.map(WeightSeedImporter::from_path).transpose()?;

    let response = preview(ScorePreviewRequest { criteria, weights })?;
    if json {
        let rendered = serde_json::to_string_pretty(&response.breakdowns)?;
        println!("{rendered}");
    } else {
        render_preview(&response);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        weights,
        progress_interval,
    } = args;

    let rows = match weights {
        Some(path) => WeightSeedImporter::from_path(path)?,
        None => ScoringWeight::seed(),
    };
    let store = Arc::new(InMemoryStore::with_weights(rows));
    store
        .define_badges(default_badges())
        .map_err(store_error)?;
    let seeded = store.seed_hotels(sample_hotels()).map_err(store_error)?;

    let config = ScoringConfig {
        progress_interval: progress_interval.max(1),
        ..ScoringConfig::default()
    };
    let service = ScoringService::new(store.clone(), store.clone(), store.clone(), &config);

    println!("Pool scoring demo ({seeded} sample hotels)");

    let report = service.recalculate_all_scores()?;
    render_report("Score recalculation", &report);

    let report = service.apply_badges()?;
    render_report("Badge application", &report);

    println!("\nHotel pool scores");
    let hotels = store.hotels().map_err(store_error)?;
    for hotel in &hotels {
        render_hotel(hotel);
    }

    Ok(())
}

fn render_report(title: &str, report: &RunReport) {
    println!("\n{title} run {}", report.run_id);
    println!(
        "- status {:?} | {} of {} processed | {} skipped | {} errors",
        report.status, report.processed, report.total, report.skipped, report.errors
    );
    let elapsed = report.finished_at - report.started_at;
    println!("- finished in {} ms", elapsed.num_milliseconds());
}

fn render_hotel(hotel: &Hotel) {
    let city = hotel.city.as_deref().unwrap_or("unknown city");
    println!("- {} ({})", hotel.name, city);
    match hotel.scores() {
        Some(scores) => println!(
            "  overall {:.1} | family {:.1} | quiet {:.1} | party {:.1}",
            scores.overall_score, scores.family_score, scores.quiet_score, scores.party_score
        ),
        None => println!("  not scored yet"),
    }
    if hotel.badges.is_empty() {
        println!("  badges: none");
    } else {
        let badges: Vec<&str> = hotel.badges.iter().map(|badge| badge.0.as_str()).collect();
        println!("  badges: {}", badges.join(", "));
    }
}

fn render_preview(response: &ScorePreviewResponse) {
    for breakdown in &response.breakdowns {
        render_breakdown(breakdown);
    }
}

fn render_breakdown(breakdown: &ScoreBreakdown) {
    println!("\n{} score {:.1}", breakdown.axis.label(), breakdown.score);
    for component in &breakdown.components {
        println!(
            "  {:<16} {:>4.2} x {:>4.2} = {:>5.2}",
            component.criterion.key(),
            component.subscore,
            component.weight,
            component.contribution()
        );
    }
    for bonus in &breakdown.bonuses {
        let (score, weight) = bonus.terms();
        println!("  bonus {bonus:?}: +{score:.1} (weight {weight:.1})");
    }
    println!(
        "  total {:.2} / weight {:.2} = {:.3} average",
        breakdown.total_score, breakdown.total_weight, breakdown.weighted_average
    );
}

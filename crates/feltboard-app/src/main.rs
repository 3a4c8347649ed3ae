// Feltboard entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config and refresh state
// 3. Load cached seasons
// 4. Refresh the cache if it is stale (failures fall back to the cache)
// 5. Print the current season's standings and leaderboards

use feltboard_core::config::{self, RefreshState};
use feltboard_core::sheets::RemoteSheets;
use feltboard_core::stats::ranking::{self, LeaderboardEntry};
use feltboard_core::store::{RefreshOutcome, SeasonStore};

use anyhow::Context;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Feltboard starting up");

    // 2. Load config and refresh state
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, data dir {}",
        config.league.name,
        config.data_dir.display()
    );
    let mut state = RefreshState::load(&config.state_path).context("failed to load refresh state")?;

    // 3. Load cached seasons
    let store = SeasonStore::open(&config.data_dir);

    // 4. Refresh if stale
    let remote = RemoteSheets::from_config(&config);
    if remote.is_active() {
        let outcome = store
            .refresh_if_stale(&remote, &mut state, config.refresh.interval(), chrono::Utc::now())
            .await;
        match &outcome {
            RefreshOutcome::Refreshed {
                updated, failed, ..
            } => {
                info!("Refreshed {} sheet(s), {} failed", updated.len(), failed.len());
                if let Err(e) = state.save(&config.state_path) {
                    warn!("failed to persist refresh state: {e}");
                }
            }
            RefreshOutcome::Failed => warn!("Refresh failed; serving cached seasons"),
            RefreshOutcome::Fresh | RefreshOutcome::InProgress => {}
        }
    } else {
        info!("Remote sheets not configured; serving cached seasons only");
    }

    // 5. Report the current season
    let Some(season_id) = current_season_id(&state, &store) else {
        println!("No seasons found in {}", config.data_dir.display());
        return Ok(());
    };
    let season = store.get_season(&season_id)?;
    println!("{} ({})", season.title(), config.league.name);
    println!();

    println!("Standings");
    for row in ranking::standings(&store, &season_id)? {
        println!(
            "  {:>3}. {:<24} {:>8.2}  (bonus {})",
            row.rank, row.name, row.total_points, row.bonus_points
        );
    }

    print_board("Most final tables", &ranking::most_final_tables(&store, &season_id)?);
    print_board("Most top-3 finishes", &ranking::most_top_3(&store, &season_id)?);
    print_board(
        "Longest final-table streak",
        &ranking::most_consecutive_finals(&store, &season_id)?,
    );
    print_board(
        "Sum of placements (lower is better)",
        &ranking::sum_of_placements(&store, &season_id)?,
    );

    info!("Feltboard finished");
    Ok(())
}

/// The season recorded by the last refresh if it is loaded, otherwise the
/// cached season with the highest season number.
fn current_season_id(state: &RefreshState, store: &SeasonStore) -> Option<String> {
    state
        .current_season
        .clone()
        .filter(|id| store.get_season(id).is_ok())
        .or_else(|| {
            store.season_ids().into_iter().max_by_key(|id| {
                store.get_season(id).map(|s| s.number()).unwrap_or_default()
            })
        })
}

fn print_board(title: &str, entries: &[LeaderboardEntry]) {
    println!();
    println!("{title}");
    if entries.is_empty() {
        println!("  (none)");
    }
    for entry in entries {
        println!("  {:<28} {:>4}", entry.name, entry.value);
    }
}

/// Initialize tracing to log to a file so stdout stays a clean report.
/// `RUST_LOG` overrides the default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    // Truncated on every run; only the latest session is kept.
    let log_file = std::fs::File::create(log_dir.join("feltboard.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feltboard=info,feltboard_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

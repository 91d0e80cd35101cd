use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use calouro_tracker::api::{CalouroApi, HttpApi};
use calouro_tracker::config::Config;
use calouro_tracker::dashboard::{ContentState, Dashboard};
use calouro_tracker::export::ExportFormat;
use calouro_tracker::filter::FilterState;
use calouro_tracker::fixtures::FixtureApi;
use calouro_tracker::models::{CalouroStatus, HouseType, PlanTier};
use calouro_tracker::mutation::{Notice, NoticeLevel};
use calouro_tracker::options::LoadOutcome;
use calouro_tracker::view::StudentViewModel;

#[derive(Parser)]
#[command(name = "calouros")]
#[command(about = "Find and track incoming students for your república", long_about = None)]
struct Cli {
    /// Override CALOUROS_CITY
    #[arg(long, global = true)]
    city: Option<String>,
    /// Override CALOUROS_HOUSE_TYPE (masculina, feminina, mista)
    #[arg(long, global = true)]
    house_type: Option<String>,
    /// Override CALOUROS_PLAN (free, premium)
    #[arg(long, global = true)]
    plan: Option<String>,
    /// Use the built-in demo roster instead of the backend
    #[arg(long, global = true, conflicts_with = "fixtures")]
    demo: bool,
    /// Serve the roster from a CSV file instead of the backend
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long)]
    course: Vec<String>,
    #[arg(long)]
    university: Vec<String>,
    #[arg(long)]
    unit: Vec<String>,
    #[arg(long = "call")]
    call: Vec<u32>,
    #[arg(long)]
    status: Vec<CalouroStatus>,
    /// Free-text search over name, course and university
    #[arg(long)]
    q: Option<String>,
}

impl FilterArgs {
    fn into_state(self) -> FilterState {
        FilterState {
            q: self.q.unwrap_or_default(),
            courses: self.course.into_iter().collect(),
            universities: self.university.into_iter().collect(),
            units: self.unit.into_iter().collect(),
            call_numbers: self.call.into_iter().collect(),
            statuses: self.status.into_iter().collect(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Xlsx,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Xlsx => ExportFormat::Xlsx,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show one page of calouros
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        per_page: u32,
    },
    /// Mark a calouro as favorite (or unmark with --off)
    Favorite {
        /// Row id as shown by `list`
        id: String,
        #[arg(long)]
        off: bool,
    },
    /// Change a calouro's status
    Status { id: String, status: CalouroStatus },
    /// Show the values available for each filter
    Options,
    /// Export every filtered calouro to a spreadsheet
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "xlsx")]
        format: FormatArg,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Generate a markdown summary of the filtered calouros
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Manage saved filters
    Filters {
        #[command(subcommand)]
        action: FilterCommands,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    List,
    Save {
        name: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        shared: bool,
    },
    Rename { id: u64, name: String },
    Delete {
        id: u64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Apply a saved filter and list the first page
    Load { id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(city) = cli.city {
        config.house.city = Some(city);
    }
    if let Some(house_type) = cli.house_type.as_deref() {
        config.house.house_type = HouseType::parse_lenient(Some(house_type));
    }
    if let Some(plan) = cli.plan.as_deref() {
        config.house.plan = PlanTier::parse_lenient(Some(plan));
    }

    let api: Arc<dyn CalouroApi> = if cli.demo {
        Arc::new(FixtureApi::demo())
    } else if let Some(path) = &cli.fixtures {
        Arc::new(FixtureApi::from_csv(path)?)
    } else {
        let url = config.require_api_url()?;
        Arc::new(
            HttpApi::new(url, config.api_token.as_ref(), config.timeout)
                .context("failed to build API client")?,
        )
    };

    let (tx, mut notices) = mpsc::unbounded_channel();
    let mut dashboard = Dashboard::new(api, config.house.clone(), tx);

    match cli.command {
        Commands::List {
            filters,
            page,
            per_page,
        } => {
            load(&mut dashboard).await?;
            dashboard.replace_filters(filters.into_state());
            dashboard.set_items_per_page(per_page);
            dashboard.go_to_page(page);
            print_page(&mut dashboard);
        }
        Commands::Favorite { id, off } => {
            load(&mut dashboard).await?;
            let id = find_row(&dashboard, &id)?.id;
            if let Some(task) = dashboard.toggle_favorite(&id, !off) {
                task.await.context("favorite update task failed")?;
            }
            drain_notices(&mut notices);
        }
        Commands::Status { id, status } => {
            load(&mut dashboard).await?;
            let id = find_row(&dashboard, &id)?.id;
            if let Some(task) = dashboard.change_status(&id, status) {
                task.await.context("status update task failed")?;
            }
            drain_notices(&mut notices);
        }
        Commands::Options => match dashboard.load_options()?.outcome().await {
            LoadOutcome::Loaded(options) => {
                println!("Cursos: {}", options.courses.join(", "));
                println!("Universidades: {}", options.universities.join(", "));
                println!("Unidades: {}", options.units.join(", "));
                let calls: Vec<String> =
                    options.call_numbers.iter().map(u32::to_string).collect();
                println!("Chamadas: {}", calls.join(", "));
            }
            LoadOutcome::Superseded => {}
        },
        Commands::Export {
            filters,
            format,
            out_dir,
        } => {
            load(&mut dashboard).await?;
            dashboard.replace_filters(filters.into_state());
            let path = dashboard.export(&out_dir, format.into(), Utc::now().date_naive())?;
            println!("Export written to {}.", path.display());
        }
        Commands::Report { filters, out } => {
            load(&mut dashboard).await?;
            dashboard.replace_filters(filters.into_state());
            let report = dashboard.report(Utc::now().date_naive())?;
            match out {
                Some(path) => {
                    std::fs::write(&path, report)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Filters { action } => run_filters(&mut dashboard, action).await?,
    }

    Ok(())
}

async fn run_filters(dashboard: &mut Dashboard, action: FilterCommands) -> anyhow::Result<()> {
    let saved = dashboard.saved_filters();
    match action {
        FilterCommands::List => {
            let filters = saved.list().await?;
            if filters.is_empty() {
                println!("No saved filters.");
            }
            for filter in filters {
                println!(
                    "- [{}] {}{} (used {}x, created {})",
                    filter.id,
                    filter.name,
                    if filter.is_shared { " (shared)" } else { "" },
                    filter.usage_count,
                    filter.created_at.format("%Y-%m-%d")
                );
            }
        }
        FilterCommands::Save {
            name,
            filters,
            shared,
        } => {
            let filter = saved.save(&name, &filters.into_state(), shared).await?;
            println!("Saved filter {} as #{}.", filter.name, filter.id);
        }
        FilterCommands::Rename { id, name } => {
            let filter = saved.rename(id, &name).await?;
            println!("Filter #{} renamed to {}.", filter.id, filter.name);
        }
        FilterCommands::Delete { id, yes } => {
            let pending = saved.request_delete(id).await?;
            if !yes {
                println!("{}", pending.prompt());
                println!("Re-run with --yes to delete.");
                return Ok(());
            }
            saved.confirm_delete(pending).await?;
            println!("Filter #{id} deleted.");
        }
        FilterCommands::Load { id } => {
            load(dashboard).await?;
            dashboard.apply_saved_filter(id).await?;
            print_page(dashboard);
        }
    }
    Ok(())
}

/// Loads the dashboard, turning blocking states into readable errors.
async fn load(dashboard: &mut Dashboard) -> anyhow::Result<()> {
    let result = dashboard.refresh().await;
    match dashboard.content_state() {
        ContentState::CityNotConfigured => {
            anyhow::bail!("No city configured for this house. Set CALOUROS_CITY or pass --city.")
        }
        ContentState::Unavailable { message } => {
            anyhow::bail!("Could not load calouros: {message}. Try again.")
        }
        ContentState::Ready { .. } => result.map_err(Into::into),
    }
}

fn find_row(dashboard: &Dashboard, id: &str) -> anyhow::Result<StudentViewModel> {
    dashboard
        .view_models()
        .into_iter()
        .find(|row| row.id.to_string() == id)
        .with_context(|| format!("no calouro with id {id}"))
}

fn print_page(dashboard: &mut Dashboard) {
    let page = dashboard.page();

    for chip in &page.chips {
        println!("[{}]", chip.label);
    }
    if page.rows.is_empty() {
        println!("No calouros match these filters.");
        return;
    }

    for row in &page.rows {
        println!(
            "{} {} | {} | {} {} | {}ª chamada | {}{}",
            if row.is_favorited { "*" } else { " " },
            row.name,
            row.course,
            row.university,
            row.campus,
            row.chamada,
            row.status.label(),
            if row.remanejado { " | remanejado" } else { "" },
        );
        println!("    id: {}", row.id);
    }

    let controls = &page.controls;
    let pages: Vec<String> = controls
        .pages
        .iter()
        .map(|page| {
            if *page == controls.current_page {
                format!("[{page}]")
            } else {
                page.to_string()
            }
        })
        .collect();
    println!(
        "{}-{} of {} | {}{}{}",
        controls.first_item,
        controls.last_item,
        controls.total_items,
        if controls.has_previous { "< " } else { "" },
        pages.join(" "),
        if controls.has_next { " >" } else { "" },
    );
}

fn drain_notices(notices: &mut mpsc::UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        match notice.level {
            NoticeLevel::Success => println!("{}", notice.message),
            NoticeLevel::Error => eprintln!("{}", notice.message),
        }
    }
}
